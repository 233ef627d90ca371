//! `dentassist ask`: one question, one answer.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    super::require_api_key(&config)?;

    let agent = super::build_agent(&config);

    eprint!("  Thinking...");
    let response = agent.respond(message).await;
    eprint!("\r              \r");
    println!("{response}");

    Ok(())
}
