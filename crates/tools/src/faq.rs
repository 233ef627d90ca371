//! `answer_faq`: canned answers about the app itself.

use async_trait::async_trait;
use dentassist_core::error::ToolError;
use dentassist_core::tool::{Tool, ToolResult};

use crate::format::format_list;
use crate::knowledge::KnowledgeBase;

pub fn answer_faq(kb: &KnowledgeBase, question: &str) -> String {
    match kb.faq(question) {
        Some(faq) => format_list(&[faq.answer]),
        None => format_list(&[
            "I only answer questions about dental conditions and app usage.",
            "Try asking about gum infection, tooth decay, or sensitivity.",
        ]),
    }
}

pub struct FaqTool {
    kb: KnowledgeBase,
}

impl FaqTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl Tool for FaqTool {
    fn name(&self) -> &str {
        "answer_faq"
    }

    fn description(&self) -> &str {
        "Answer frequently asked questions about the app: what it is, how to use it, \
         and whether it replaces a dentist."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The user's question, verbatim"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let question = arguments["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;
        Ok(ToolResult::ok(answer_faq(&self.kb, question)))
    }
}
