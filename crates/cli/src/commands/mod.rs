pub mod ask;
pub mod chat;
pub mod doctor;
pub mod init;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dentassist_agent::DentalAgent;
use dentassist_config::AppConfig;
use dentassist_core::event::EventBus;

/// The config file in use: `--config`, or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_overrides(&path)
        .map_err(|e| format!("Failed to load config: {e}").into())
}

/// Fail early with setup instructions when no key is available.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    DENTASSIST_API_KEY=...   (generic)");
    eprintln!("    GEMINI_API_KEY=...       (Gemini, the default provider)");
    eprintln!("    OPENAI_API_KEY=...       (OpenAI-compatible endpoints)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

pub fn build_agent(config: &AppConfig) -> DentalAgent {
    let provider = dentassist_providers::build_from_config(config);
    DentalAgent::from_config(config, provider, Arc::new(EventBus::default()))
}
