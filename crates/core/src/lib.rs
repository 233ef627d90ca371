//! # DentAssist Core
//!
//! Domain types, traits, and error definitions for the DentAssist
//! conversational agent. This crate has **no framework dependencies**; it
//! defines the domain model the other crates implement against.
//!
//! Every subsystem with more than one possible implementation is a trait
//! here (`Provider`, `Tool`, `SessionStore`), so the gateway and the agent can
//! be driven by scripted stand-ins in tests.

pub mod error;
pub mod event;
pub mod image;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, SessionError, ToolError};
pub use event::{DispatchOutcome, DomainEvent, EventBus};
pub use image::ImagePart;
pub use message::{ContentPart, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition};
pub use session::{SessionId, SessionStore, Turn};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
