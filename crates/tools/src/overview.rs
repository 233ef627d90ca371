//! `get_overview`: the app's feature overview, also the dispatcher fallback.

use async_trait::async_trait;
use dentassist_core::error::ToolError;
use dentassist_core::tool::{Tool, ToolResult};

use crate::format::format_numbered;
use crate::knowledge::KnowledgeBase;

pub fn get_overview(kb: &KnowledgeBase) -> String {
    format_numbered(kb.overview())
}

pub struct OverviewTool {
    kb: KnowledgeBase,
}

impl OverviewTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for OverviewTool {
    fn name(&self) -> &str {
        "get_overview"
    }

    fn description(&self) -> &str {
        "Get a numbered overview of what the dental assistant app can do."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(get_overview(&self.kb)))
    }
}
