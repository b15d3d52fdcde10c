use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use tracing::debug;

use sidequest_core::wire::{CHAT_PATH, HISTORY_PATH, STREAM_PATH};
use sidequest_core::{
    ChatError, CompanionApi, ConversationId, EventStream, HistoryResponse, SendRequest,
    SendResponse,
};
use sidequest_logging::redact_sensitive_data;

use super::sse::data_frames;

/// Longest error body carried into a [`ChatError`].
const MAX_ERROR_BODY: usize = 512;

/// Timeouts for [`HttpCompanionApi`].
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// Applied to history and send requests; streams are unbounded.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The companion chat API over HTTP and server-sent events.
pub struct HttpCompanionApi {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpCompanionApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, HttpOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            request_timeout: options.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn stream_url(&self, conversation_id: &ConversationId) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            STREAM_PATH,
            urlencoding::encode(conversation_id.as_str())
        )
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    ChatError::request(redact_sensitive_data(&e.to_string()))
}

/// Pass 2xx responses through; turn anything else into a status error.
async fn error_for_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string();
    }
    Err(ChatError::status(status.as_u16(), message))
}

#[async_trait]
impl CompanionApi for HttpCompanionApi {
    async fn fetch_history(&self, token: &str) -> Result<HistoryResponse, ChatError> {
        let url = self.endpoint(HISTORY_PATH);
        debug!(url = %url, "Fetching companion history");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport_error)?;

        error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::Decode(format!("history response: {e}")))
    }

    async fn send_message(
        &self,
        token: &str,
        request: &SendRequest,
    ) -> Result<SendResponse, ChatError> {
        let url = self.endpoint(CHAT_PATH);
        debug!(
            url = %url,
            conversation_id = ?request.conversation_id,
            "Posting companion message"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::Decode(format!("chat response: {e}")))
    }

    async fn open_stream(
        &self,
        conversation_id: &ConversationId,
        token: &str,
    ) -> Result<EventStream, ChatError> {
        let url = self.stream_url(conversation_id);
        debug!(url = %url, "Opening reply stream");

        let response = self
            .client
            .get(&url)
            .query(&[("token", token)])
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ChatError::Stream(redact_sensitive_data(&e.to_string())))?;

        let response = error_for_status(response)
            .await
            .map_err(|e| ChatError::Stream(e.to_string()))?;

        Ok(data_frames(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpCompanionApi::new("http://localhost:8000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(
            api.endpoint(HISTORY_PATH),
            "http://localhost:8000/api/v1/companion/history"
        );
    }

    #[test]
    fn conversation_id_is_percent_encoded() {
        let api = HttpCompanionApi::new("http://localhost:8000").unwrap();
        let url = api.stream_url(&ConversationId::from("a b/c"));
        assert_eq!(url, "http://localhost:8000/api/v1/companion/stream/a%20b%2Fc");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let api = HttpCompanionApi::with_options(
            "http://127.0.0.1:9",
            HttpOptions {
                request_timeout: Duration::from_secs(2),
                connect_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();
        let err = api.fetch_history("tok").await.unwrap_err();
        assert!(matches!(err, ChatError::Request { status: None, .. }));
    }
}
