mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_PATHS: [&str; 4] = [
    "./realstate.toml",
    "./config.toml",
    "~/.config/realstate/config.toml",
    "/etc/realstate/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config.database.apply_env();
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    config.database.apply_env();
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    config
        .database
        .validate()
        .context("Invalid [database] section")?;

    if let Some(filter) = &config.logging.filter {
        if filter.trim().is_empty() {
            anyhow::bail!("logging.filter cannot be empty");
        }
    }

    Ok(())
}
