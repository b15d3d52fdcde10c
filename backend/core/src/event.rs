use serde::{Deserialize, Serialize};

/// One server-push event on a companion reply stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of the assistant reply
    Token { content: String },
    /// The reply is finished
    Complete,
    /// The backend gave up on the reply
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl StreamEvent {
    /// Decode a single event payload. Unknown `type` tags are rejected.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl std::fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEvent::Token { .. } => write!(f, "token"),
            StreamEvent::Complete => write!(f, "complete"),
            StreamEvent::Error { .. } => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_event_kinds() {
        assert_eq!(
            StreamEvent::decode(r#"{"type":"token","content":"Hi"}"#).unwrap(),
            StreamEvent::Token { content: "Hi".into() }
        );
        assert_eq!(
            StreamEvent::decode(r#"{"type":"complete"}"#).unwrap(),
            StreamEvent::Complete
        );
        assert_eq!(
            StreamEvent::decode(r#"{"type":"error","message":"model overloaded"}"#).unwrap(),
            StreamEvent::Error { message: Some("model overloaded".into()) }
        );
    }

    #[test]
    fn error_message_is_optional() {
        assert_eq!(
            StreamEvent::decode(r#"{"type":"error"}"#).unwrap(),
            StreamEvent::Error { message: None }
        );
    }

    #[test]
    fn rejects_unknown_tags_and_garbage() {
        assert!(StreamEvent::decode(r#"{"type":"heartbeat"}"#).is_err());
        assert!(StreamEvent::decode(r#"{"content":"no tag"}"#).is_err());
        assert!(StreamEvent::decode("not json").is_err());
        assert!(StreamEvent::decode(r#"{"type":"token"}"#).is_err());
    }

    #[test]
    fn ignores_extra_fields() {
        let event = StreamEvent::decode(r#"{"type":"complete","usage":{"tokens":12}}"#).unwrap();
        assert_eq!(event, StreamEvent::Complete);
    }

    #[test]
    fn display_names_the_event_type() {
        assert_eq!(StreamEvent::Token { content: "x".into() }.to_string(), "token");
        assert_eq!(StreamEvent::Complete.to_string(), "complete");
    }
}
