//! JSON bodies exchanged with the companion chat API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::message::{ConversationId, Message, Role};

pub const HISTORY_PATH: &str = "/api/v1/companion/history";
pub const CHAT_PATH: &str = "/api/v1/companion/chat";
pub const STREAM_PATH: &str = "/api/v1/companion/stream";

/// `GET /api/v1/companion/history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// A message as the backend serializes it; `timestamp` is an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// `POST /api/v1/companion/chat` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

/// `POST /api/v1/companion/chat` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    pub conversation_id: ConversationId,
}

impl WireMessage {
    pub fn into_message(self) -> Result<Message, ChatError> {
        let timestamp = parse_wire_timestamp(&self.timestamp)?;
        Ok(Message::new(self.role, self.content, timestamp))
    }
}

impl HistoryResponse {
    /// The most recent conversation with typed timestamps, if there is one.
    pub fn into_latest(self) -> Result<Option<(ConversationId, Vec<Message>)>, ChatError> {
        let Some(latest) = self.conversations.into_iter().next() else {
            return Ok(None);
        };
        let messages = latest
            .messages
            .into_iter()
            .map(WireMessage::into_message)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some((latest.id, messages)))
    }
}

/// Parse an ISO-8601 timestamp. Offset-less values are taken as UTC.
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, ChatError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| ChatError::Decode(format!("invalid timestamp '{raw}': {e}")))
}
