//! `dentassist doctor`: diagnose configuration and provider health.

use std::path::Path;

use dentassist_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("DentAssist Doctor");
    println!("=================\n");

    let mut issues = 0;
    let path = super::config_path(config_path);

    if path.exists() {
        println!("  [ok]   Config file found: {}", path.display());
    } else {
        println!(
            "  [warn] No config file at {} (defaults in use; run `dentassist init`)",
            path.display()
        );
    }

    let config = match AppConfig::load_with_overrides(&path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found. Fix the config and re-run.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [fail] No API key: set DENTASSIST_API_KEY or GEMINI_API_KEY");
        issues += 1;
    }

    let provider = dentassist_providers::build_from_config(&config);
    match provider.health_check().await {
        Ok(true) => println!(
            "  [ok]   Provider reachable: {} ({})",
            provider.name(),
            config.base_url
        ),
        Ok(false) => {
            println!("  [fail] Provider answered but rejected the request: {}", config.base_url);
            issues += 1;
        }
        Err(e) => {
            println!("  [fail] Provider unreachable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
