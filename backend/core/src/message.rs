use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn in a conversation.
///
/// `content` only changes while the message is the in-flight assistant reply;
/// `timestamp` doubles as the key that stream tokens use to find that reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    /// True if this is the assistant message identified by `marker`.
    pub fn is_reply_marked(&self, marker: DateTime<Utc>) -> bool {
        self.role == Role::Assistant && self.timestamp == marker
    }
}

/// Mint a timestamp strictly later than every message in `history`.
///
/// Wall-clock time is used when it is already ahead; otherwise the newest
/// timestamp is bumped by one microsecond so markers never collide.
pub fn next_timestamp(history: &[Message]) -> DateTime<Utc> {
    let now = Utc::now();
    match history.iter().map(|m| m.timestamp).max() {
        Some(latest) if now <= latest => latest + Duration::microseconds(1),
        _ => now,
    }
}

/// Opaque conversation key minted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
