//! SideQuest client configuration schema, typed for serde YAML/JSON.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideQuestConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Where the companion chat API lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL; falls back to `origin` when unset or blank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Origin the client is served from
    pub origin: String,
    /// Timeout for history and send requests (streams are never timed out)
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: DEFAULT_ORIGIN.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// The base URL requests are built from, without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.origin.trim());
        base.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token for the companion API, usually `${SIDEQUEST_TOKEN}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON logs; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Emit console logs as JSON
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
            json: false,
        }
    }
}
