//! Config redaction: safe-to-print config snapshots.

use serde_json::Value;

use crate::schema::SideQuestConfig;

static SENSITIVE_KEYS: &[&str] = &["token", "access_token", "api_key", "password", "secret"];

/// Serialize the config with every sensitive field masked as `"abcd***"`.
pub fn redact(config: &SideQuestConfig) -> Value {
    let value = serde_json::to_value(config).unwrap_or(Value::Null);
    redact_value(&value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    match s.char_indices().nth(4) {
        Some((idx, _)) if s.chars().count() > 8 => format!("{}***", &s[..idx]),
        _ => "***".to_string(),
    }
}

fn redact_value(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => Value::String(mask(s)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v, k)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_value(v, key)).collect()),
        other => other.clone(),
    }
}
