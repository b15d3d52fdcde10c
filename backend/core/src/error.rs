use thiserror::Error;

/// Errors raised by the companion client and its collaborators.
///
/// None of these escape the session controller; it turns each one into the
/// user-facing string exposed through the session snapshot.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("auth token unavailable: {0}")]
    Auth(String),

    #[error("request failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Request { status: Option<u16>, message: String },

    #[error("stream failed: {0}")]
    Stream(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl ChatError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status attached to a failed request, if the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_includes_status() {
        let err = ChatError::status(500, "internal error");
        assert_eq!(err.to_string(), "request failed (500): internal error");
        assert_eq!(err.http_status(), Some(500));
    }

    #[test]
    fn request_error_without_status() {
        let err = ChatError::request("connection refused");
        assert_eq!(err.to_string(), "request failed: connection refused");
        assert_eq!(err.http_status(), None);
    }
}
