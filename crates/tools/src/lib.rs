//! Dental knowledge and agent tools for DentAssist.
//!
//! - [`knowledge`]: the embedded knowledge base (conditions, FAQs, overview)
//! - [`format`]: dotted / numbered list rendering
//! - one module per tool, each exposing a pure function plus a [`Tool`]
//!   implementation the model can call
//!
//! [`Tool`]: dentassist_core::tool::Tool

pub mod condition_info;
pub mod faq;
pub mod format;
pub mod knowledge;
pub mod list_conditions;
pub mod overview;

use dentassist_core::tool::ToolRegistry;

pub use condition_info::{ConditionInfoTool, get_condition_info};
pub use faq::{FaqTool, answer_faq};
pub use format::{format_list, format_numbered};
pub use knowledge::KnowledgeBase;
pub use list_conditions::{ListConditionsTool, list_conditions};
pub use overview::{OverviewTool, get_overview};

/// Create a registry holding the four dental tools over `kb`.
pub fn registry(kb: KnowledgeBase) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ConditionInfoTool::new(kb)));
    registry.register(Box::new(OverviewTool::new(kb)));
    registry.register(Box::new(ListConditionsTool::new(kb)));
    registry.register(Box::new(FaqTool::new(kb)));
    registry
}

/// Create a registry over the built-in knowledge base.
pub fn default_registry() -> ToolRegistry {
    registry(KnowledgeBase::builtin())
}
