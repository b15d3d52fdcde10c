use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChatError;
use crate::message::ConversationId;
use crate::wire::{HistoryResponse, SendRequest, SendResponse};

/// Raw event payloads from a reply stream, in the order the server sent them.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Source of the bearer token attached to every backend call.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether a user is currently signed in.
    fn is_authenticated(&self) -> bool;

    /// Fetch a bearer token. May refresh over the network.
    async fn token(&self) -> Result<String, ChatError>;
}

/// The companion chat backend.
#[async_trait]
pub trait CompanionApi: Send + Sync {
    /// Fetch the caller's conversations, most recent first.
    async fn fetch_history(&self, token: &str) -> Result<HistoryResponse, ChatError>;

    /// Post a user message, starting a conversation when none is given.
    async fn send_message(
        &self,
        token: &str,
        request: &SendRequest,
    ) -> Result<SendResponse, ChatError>;

    /// Open the reply stream for a conversation.
    ///
    /// The token travels as a query parameter since the stream transport
    /// cannot carry custom headers.
    async fn open_stream(
        &self,
        conversation_id: &ConversationId,
        token: &str,
    ) -> Result<EventStream, ChatError>;
}
