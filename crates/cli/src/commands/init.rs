//! `dentassist init`: write the default config file.

use std::path::Path;

use dentassist_config::AppConfig;

pub fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    if path.exists() && !force {
        println!("Config already exists at: {}", path.display());
        println!("Edit it manually, or re-run with --force to overwrite.");
        return Ok(());
    }

    write_default(&path)?;
    println!("Created config at: {}", path.display());
    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY (or add `api_key` to the file)");
    println!("  2. Run `dentassist doctor`");
    println!("  3. Run `dentassist serve` or `dentassist chat`");

    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(Some(path.as_path()), false).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.model, AppConfig::default().model);
        assert_eq!(loaded.gateway.port, 8000);
    }

    #[test]
    fn existing_file_is_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"custom\"\n").unwrap();

        run(Some(path.as_path()), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "model = \"custom\"\n");

        run(Some(path.as_path()), true).unwrap();
        assert!(AppConfig::load_from(&path).unwrap().model != "custom");
    }
}
