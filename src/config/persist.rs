//! Writing configuration back to disk.

use super::{Config, ConfigFormat};
use anyhow::{Context, Result};
use std::path::Path;

/// Serialize `config` in the format implied by `path` and write it there.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = match ConfigFormat::from_path(path) {
        ConfigFormat::Toml => toml::to_string_pretty(config).context("Failed to serialize config")?,
        ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to serialize config")?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to serialize config")?
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
