//! Log Redaction Layer
//!
//! Scrubs bearer tokens, `token=` query values, and JWT-shaped strings from
//! text before it reaches a log sink. Stream URLs carry the auth token as a
//! query parameter, so every URL is passed through here before logging.

use regex::Regex;
use std::sync::LazyLock;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("valid bearer regex"));
static QUERY_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:access_)?token=)[^&#\s]+").expect("valid query token regex")
});
static JWT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").expect("valid jwt regex")
});

pub const REDACTED: &str = "[REDACTED]";

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, format!("Bearer {REDACTED}"));
    let redacted = QUERY_TOKEN_RE.replace_all(&redacted, format!("${{1}}{REDACTED}"));
    JWT_RE.replace_all(&redacted, REDACTED).into_owned()
}
