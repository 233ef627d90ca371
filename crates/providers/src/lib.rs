//! LLM provider implementations for DentAssist.
//!
//! All providers implement the `dentassist_core::Provider` trait. The only
//! backend is an OpenAI-compatible chat-completions client, which covers
//! Gemini's OpenAI endpoint, OpenAI itself, and local servers.

pub mod openai_compat;

use std::sync::Arc;

use dentassist_config::AppConfig;
use dentassist_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    Arc::new(OpenAiCompatProvider::new(
        &config.provider,
        &config.base_url,
        config.api_key.clone().unwrap_or_default(),
    ))
}
