use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use sidequest_core::{
    ChatError, CompanionApi, ConversationId, EventStream, HistoryResponse, SendRequest,
    SendResponse,
};

/// Conversation id handed out when a send starts a new conversation.
pub const MOCK_CONVERSATION_ID: &str = "mock-conversation";

const MOCK_GREETING: [&str; 6] = ["Hello", "! I'm", " your", " SideQuest", " companion", "."];

/// Encode a `token` event.
pub fn token_frame(content: &str) -> String {
    json!({ "type": "token", "content": content }).to_string()
}

/// Encode a `complete` event.
pub fn complete_frame() -> String {
    json!({ "type": "complete" }).to_string()
}

/// Encode an `error` event, with or without a message.
pub fn error_frame(message: Option<&str>) -> String {
    match message {
        Some(message) => json!({ "type": "error", "message": message }),
        None => json!({ "type": "error" }),
    }
    .to_string()
}

/// Scripted answer to one `send_message` call.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Accept(ConversationId),
    /// Fail with this HTTP status
    Reject(u16),
}

enum StreamScript {
    Frames(Vec<String>),
    Channel(mpsc::Receiver<Result<String, ChatError>>),
    Refuse(u16),
}

#[derive(Default)]
struct Recorded {
    history: Option<HistoryResponse>,
    history_failure: Option<u16>,
    history_delay: Option<Duration>,
    sends: VecDeque<(SendOutcome, Option<Duration>)>,
    streams: VecDeque<StreamScript>,
    sent: Vec<SendRequest>,
    opened: Vec<ConversationId>,
    stream_tokens: Vec<String>,
    history_calls: usize,
}

/// In-memory companion backend for tests and offline runs.
///
/// Unscripted sends echo the request's conversation id (or start
/// [`MOCK_CONVERSATION_ID`]); unscripted streams reply with a short greeting.
#[derive(Default)]
pub struct MockCompanionApi {
    inner: Mutex<Recorded>,
    open_streams: Arc<AtomicUsize>,
}

/// Decrements the open-stream count when the stream is dropped.
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockCompanionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, history: HistoryResponse) -> Self {
        self.recorded_mut().history = Some(history);
        self
    }

    pub fn with_history_failure(mut self, status: u16) -> Self {
        self.recorded_mut().history_failure = Some(status);
        self
    }

    /// Answer history requests only after `delay`.
    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.recorded_mut().history_delay = Some(delay);
        self
    }

    pub fn queue_send(&self, outcome: SendOutcome) {
        self.lock().sends.push_back((outcome, None));
    }

    /// Answer the next send only after `delay`.
    pub fn queue_send_delayed(&self, outcome: SendOutcome, delay: Duration) {
        self.lock().sends.push_back((outcome, Some(delay)));
    }

    /// Serve the next stream from a fixed list of payloads, then end it.
    pub fn queue_stream(&self, frames: Vec<String>) {
        self.lock().streams.push_back(StreamScript::Frames(frames));
    }

    pub fn queue_stream_refusal(&self, status: u16) {
        self.lock().streams.push_back(StreamScript::Refuse(status));
    }

    /// Serve the next stream from a channel the caller drives.
    ///
    /// The stream ends when the sender is dropped; sends fail once the
    /// session has closed the stream.
    pub fn stream_channel(&self) -> mpsc::Sender<Result<String, ChatError>> {
        let (tx, rx) = mpsc::channel(16);
        self.lock().streams.push_back(StreamScript::Channel(rx));
        tx
    }

    pub fn sent_requests(&self) -> Vec<SendRequest> {
        self.lock().sent.clone()
    }

    /// Conversation ids of every stream opened, in order.
    pub fn opened_streams(&self) -> Vec<ConversationId> {
        self.lock().opened.clone()
    }

    /// Tokens presented when opening streams.
    pub fn stream_tokens(&self) -> Vec<String> {
        self.lock().stream_tokens.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.lock().history_calls
    }

    /// Streams opened and not yet dropped.
    pub fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recorded_mut(&mut self) -> &mut Recorded {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, events: EventStream) -> EventStream {
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(Arc::clone(&self.open_streams));
        Box::pin(events.map(move |item| {
            let _ = &guard;
            item
        }))
    }
}

#[async_trait]
impl CompanionApi for MockCompanionApi {
    async fn fetch_history(&self, _token: &str) -> Result<HistoryResponse, ChatError> {
        let (result, delay) = {
            let mut recorded = self.lock();
            recorded.history_calls += 1;
            let result = match recorded.history_failure {
                Some(status) => Err(ChatError::status(status, "mock history failure")),
                None => Ok(recorded.history.clone().unwrap_or_default()),
            };
            (result, recorded.history_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn send_message(
        &self,
        _token: &str,
        request: &SendRequest,
    ) -> Result<SendResponse, ChatError> {
        let (outcome, delay) = {
            let mut recorded = self.lock();
            recorded.sent.push(request.clone());
            recorded.sends.pop_front().unwrap_or_else(|| {
                let id = request
                    .conversation_id
                    .clone()
                    .unwrap_or_else(|| MOCK_CONVERSATION_ID.into());
                (SendOutcome::Accept(id), None)
            })
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            SendOutcome::Accept(conversation_id) => Ok(SendResponse { conversation_id }),
            SendOutcome::Reject(status) => Err(ChatError::status(status, "mock send failure")),
        }
    }

    async fn open_stream(
        &self,
        conversation_id: &ConversationId,
        token: &str,
    ) -> Result<EventStream, ChatError> {
        let mut recorded = self.lock();
        recorded.stream_tokens.push(token.to_string());

        let script = recorded.streams.pop_front().unwrap_or_else(|| {
            let mut frames: Vec<_> = MOCK_GREETING.iter().map(|t| token_frame(t)).collect();
            frames.push(complete_frame());
            StreamScript::Frames(frames)
        });

        let events: EventStream = match script {
            StreamScript::Frames(frames) => Box::pin(stream::iter(frames.into_iter().map(Ok))),
            StreamScript::Channel(rx) => Box::pin(ReceiverStream::new(rx)),
            StreamScript::Refuse(status) => {
                recorded.opened.push(conversation_id.clone());
                return Err(ChatError::Stream(format!("mock stream refused ({status})")));
            }
        };

        let events = self.track(events);
        recorded.opened.push(conversation_id.clone());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidequest_core::StreamEvent;

    #[test]
    fn frame_helpers_decode() {
        assert_eq!(
            StreamEvent::decode(&token_frame("Hi")).unwrap(),
            StreamEvent::Token { content: "Hi".into() }
        );
        assert_eq!(StreamEvent::decode(&complete_frame()).unwrap(), StreamEvent::Complete);
        assert_eq!(
            StreamEvent::decode(&error_frame(None)).unwrap(),
            StreamEvent::Error { message: None }
        );
    }

    #[tokio::test]
    async fn unscripted_send_echoes_conversation() {
        let api = MockCompanionApi::new();
        let fresh = SendRequest { message: "hi".into(), conversation_id: None };
        let resp = api.send_message("t", &fresh).await.unwrap();
        assert_eq!(resp.conversation_id.as_str(), MOCK_CONVERSATION_ID);

        let follow_up = SendRequest { message: "again".into(), conversation_id: Some("c9".into()) };
        let resp = api.send_message("t", &follow_up).await.unwrap();
        assert_eq!(resp.conversation_id.as_str(), "c9");
        assert_eq!(api.sent_requests().len(), 2);
    }

    #[tokio::test]
    async fn dropping_a_stream_updates_open_count() {
        let api = MockCompanionApi::new();
        let events = api.open_stream(&"c1".into(), "t").await.unwrap();
        assert_eq!(api.open_stream_count(), 1);

        let frames: Vec<_> = events.collect().await;
        assert_eq!(frames.last().unwrap().as_ref().unwrap(), &complete_frame());
        assert_eq!(api.open_stream_count(), 0);
    }
}
