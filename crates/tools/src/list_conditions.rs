//! `list_conditions`: every condition the assistant can check.

use async_trait::async_trait;
use dentassist_core::error::ToolError;
use dentassist_core::tool::{Tool, ToolResult};

use crate::format::format_list;
use crate::knowledge::KnowledgeBase;

pub fn list_conditions(kb: &KnowledgeBase) -> String {
    let mut items = vec!["Conditions I can check:"];
    items.extend(kb.topic_names());
    format_list(&items)
}

pub struct ListConditionsTool {
    kb: KnowledgeBase,
}

impl ListConditionsTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for ListConditionsTool {
    fn name(&self) -> &str {
        "list_conditions"
    }

    fn description(&self) -> &str {
        "List the dental conditions the assistant can check."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(list_conditions(&self.kb)))
    }
}
