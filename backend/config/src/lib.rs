//! `sidequest-config`: SideQuest client configuration management.
//!
//! Provides:
//! - Typed config schema (API endpoint, auth token, logging)
//! - YAML read/write
//! - `${ENV_VAR}` substitution and `SIDEQUEST_*` overrides
//! - Config redaction for safe display
//! - Validation

pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use redact::redact;
pub use schema::{ApiConfig, AuthConfig, LoggingConfig, SideQuestConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load, substitute env vars, apply env overrides, and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<SideQuestConfig> {
    let mut config = match io::load_raw(path).await? {
        Some(raw) => {
            let value = resolve_env_vars(&raw).context("Failed to resolve env vars in config")?;
            serde_json::from_value(value)
                .context("Failed to deserialize config after env substitution")?
        }
        None => SideQuestConfig::default(),
    };

    apply_env_overrides(&mut config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("{first}");
    }

    Ok(config)
}
