//! Config file read/write.

use crate::schema::SideQuestConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the config directory.
/// Priority: `SIDEQUEST_CONFIG_DIR` env > `~/.sidequest/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SIDEQUEST_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".sidequest"))
        .unwrap_or_else(|| PathBuf::from(".sidequest"))
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the raw YAML document as a JSON value tree.
///
/// Returns `Ok(None)` if the file doesn't exist (first run).
pub async fn load_raw(path: &Path) -> Result<Option<serde_json::Value>> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(Some(value))
}

/// Load and parse the config from disk without env substitution.
pub async fn load_config(path: &Path) -> Result<SideQuestConfig> {
    match load_raw(path).await? {
        Some(value) => serde_json::from_value(value)
            .with_context(|| format!("Invalid config at: {}", path.display())),
        None => Ok(SideQuestConfig::default()),
    }
}

/// Write config to disk atomically (write to temp file, rename).
pub async fn write_config(config: &SideQuestConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}
