//! Config validation: schema checks with user-friendly error messages.

use crate::schema::SideQuestConfig;
use thiserror::Error;
use url::Url;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SideQuestConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_api(config, &mut report);
    validate_auth(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_api(config: &SideQuestConfig, report: &mut ValidationReport) {
    let api = &config.api;
    if let Some(base_url) = api.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
        check_http_url(report, "api.base_url", base_url);
    }
    check_http_url(report, "api.origin", &api.origin);

    if api.request_timeout_secs == 0 {
        report.error("api.request_timeout_secs", "Timeout must be greater than zero");
    }
    if api.connect_timeout_secs == 0 {
        report.error("api.connect_timeout_secs", "Timeout must be greater than zero");
    }
}

fn check_http_url(report: &mut ValidationReport, path: &str, raw: &str) {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.query().is_some() {
                report.warn(path, "Query string will be ignored when building request URLs");
            }
        }
        Ok(url) => report.error(path, format!("Unsupported scheme '{}'", url.scheme())),
        Err(e) => report.error(path, format!("Invalid URL: {e}")),
    }
}

fn validate_auth(config: &SideQuestConfig, report: &mut ValidationReport) {
    match config.auth.token.as_deref() {
        None => report.warn("auth.token", "No token configured; chat will run signed out"),
        Some(token) if token.trim().is_empty() => {
            report.warn("auth.token", "Token is blank; chat will run signed out")
        }
        Some(token) if token.chars().any(char::is_whitespace) => {
            report.error("auth.token", "Token must not contain whitespace")
        }
        Some(_) => {}
    }
}

fn validate_logging(config: &SideQuestConfig, report: &mut ValidationReport) {
    let level = config.logging.level.to_ascii_lowercase();
    // Directive strings such as "sidequest=debug" are left to EnvFilter.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.as_str()) {
        report.warn(
            "logging.level",
            format!("Unknown level '{}'; falling back to filter parsing", config.logging.level),
        );
    }
}
