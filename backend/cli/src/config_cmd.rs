//! CLI Config Command
//!
//! Shows the resolved configuration with secrets masked.

use std::path::Path;

use anyhow::Result;

use sidequest_config::{redact, validate, SideQuestConfig};

use crate::terminal_output::{note_info, note_warn};

pub fn run(config: &SideQuestConfig, path: &Path) -> Result<()> {
    note_info(&format!("Config file: {}", path.display()));
    note_info(&format!("Companion API: {}", config.api.resolved_base_url()));

    print!("{}", serde_yaml::to_string(&redact(config))?);

    for warning in validate(config).warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    Ok(())
}
