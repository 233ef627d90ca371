//! `get_condition_info`: describe one dental condition.

use async_trait::async_trait;
use dentassist_core::error::ToolError;
use dentassist_core::tool::{Tool, ToolResult};

use crate::format::format_list;
use crate::knowledge::KnowledgeBase;

/// Describe `condition_name`, or list the known conditions when it is unknown.
pub fn get_condition_info(kb: &KnowledgeBase, condition_name: &str) -> String {
    let name = condition_name.trim();
    match kb.topic(name) {
        Some(topic) => format_list(&[
            title_case(name),
            format!("Purpose: {}", topic.purpose),
            format!("How to use: {}", topic.how_to_use),
            format!("Benefits: {}", topic.benefits),
        ]),
        None => format_list(&[
            format!("I only know these conditions: {}", kb.topic_names().join(", ")),
            "Pick one!".to_string(),
        ]),
    }
}

/// Upper-case the first letter of every word, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if prev_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_is_letter = c.is_alphabetic();
    }
    out
}

pub struct ConditionInfoTool {
    kb: KnowledgeBase,
}

impl ConditionInfoTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for ConditionInfoTool {
    fn name(&self) -> &str {
        "get_condition_info"
    }

    fn description(&self) -> &str {
        "Get the purpose, usage instructions and benefits of a dental condition check \
         (gum infection, tooth decay, or sensitivity)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "condition_name": {
                    "type": "string",
                    "description": "Name of the condition, e.g. \"tooth decay\""
                }
            },
            "required": ["condition_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = arguments["condition_name"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments("Missing 'condition_name' argument".into())
        })?;
        Ok(ToolResult::ok(get_condition_info(&self.kb, name)))
    }
}
