//! Bearer token sources for the companion API.

use async_trait::async_trait;

use sidequest_core::{AuthProvider, ChatError};

/// A fixed bearer token, typically read from config.
#[derive(Clone, Default)]
pub struct StaticTokenAuth {
    token: Option<String>,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_optional(Some(token.into()))
    }

    /// Blank tokens are treated as signed out.
    pub fn from_optional(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }
}

impl std::fmt::Debug for StaticTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuth")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn token(&self) -> Result<String, ChatError> {
        self.token.clone().ok_or(ChatError::Unauthenticated)
    }
}

/// No user is signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOut;

#[async_trait]
impl AuthProvider for SignedOut {
    fn is_authenticated(&self) -> bool {
        false
    }

    async fn token(&self) -> Result<String, ChatError> {
        Err(ChatError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned() {
        let auth = StaticTokenAuth::new("abc");
        assert!(auth.is_authenticated());
        assert_eq!(auth.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn blank_token_is_signed_out() {
        let auth = StaticTokenAuth::from_optional(Some("   ".into()));
        assert!(!auth.is_authenticated());
        assert!(matches!(auth.token().await, Err(ChatError::Unauthenticated)));
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", StaticTokenAuth::new("secret-token"));
        assert!(!rendered.contains("secret-token"));
    }

    #[tokio::test]
    async fn signed_out_never_yields_a_token() {
        assert!(!SignedOut.is_authenticated());
        assert!(SignedOut.token().await.is_err());
    }
}
