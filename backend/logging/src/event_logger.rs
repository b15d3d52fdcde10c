//! Chat Event Logger
//!
//! Structured chat session lifecycle events, emitted on the `chat_events`
//! target so a file layer can collect them as NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

pub const CHAT_EVENTS_TARGET: &str = "chat_events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageSent {
        conversation_id: Option<String>,
        chars: usize,
    },
    StreamOpened {
        conversation_id: String,
        stream_id: u64,
    },
    StreamClosed {
        stream_id: u64,
        reason: String,
    },
    Failure {
        stage: String,
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChatEvent,
}

pub struct ChatEventLogger;

impl ChatEventLogger {
    /// Redact and record a chat event.
    pub fn log_event(session_id: &str, event: ChatEvent) -> EventLogEntry {
        let event = match event {
            ChatEvent::Failure { stage, error_msg } => ChatEvent::Failure {
                stage,
                error_msg: redact_sensitive_data(&error_msg),
            },
            ChatEvent::StreamClosed { stream_id, reason } => ChatEvent::StreamClosed {
                stream_id,
                reason: redact_sensitive_data(&reason),
            },
            other => other,
        };

        let entry = EventLogEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: CHAT_EVENTS_TARGET, entry = %json, "chat event"),
            Err(_) => info!(target: CHAT_EVENTS_TARGET, entry = ?entry, "chat event"),
        }
        entry
    }
}
