//! `dentassist serve`: start the HTTP API server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    super::require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("DentAssist API");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", config.model);
    println!("   Analyze:    {:?}", config.analyze.mode);
    println!("   Uploads:    {}", config.analyze.upload_dir.display());

    dentassist_gateway::start(config).await?;

    Ok(())
}
