//! The companion chat session controller.
//!
//! A [`ChatSession`] mediates between a text-input front-end and the
//! companion backend. It keeps history consistent under optimistic sends,
//! owns at most one live reply stream, and reports every failure as a
//! human-readable string in its snapshot instead of returning errors.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sidequest_core::{
    AuthProvider, ChatError, CompanionApi, ConversationId, SendRequest, StreamEvent,
};
use sidequest_logging::{ChatEvent, ChatEventLogger};

use crate::state::{SessionSnapshot, SessionState};
use crate::stream::StreamHandle;

pub const SIGN_IN_REQUIRED: &str = "Please sign in to chat with your companion.";
pub const AUTH_FAILED: &str = "Authentication failed. Please sign in again.";
pub const SEND_FAILED: &str = "Failed to send message. Please try again.";
pub const HISTORY_FAILED: &str = "Failed to load chat history.";
pub const STREAM_ERROR_DEFAULT: &str = "An error occurred while generating a response.";
pub const CONNECTION_LOST: &str = "Connection lost. Please try again.";

/// Longest malformed payload echoed into logs.
const MAX_LOGGED_PAYLOAD: usize = 200;

/// State shared between the controller and its stream consumer task.
struct Shared {
    session_id: String,
    api: Arc<dyn CompanionApi>,
    auth: Arc<dyn AuthProvider>,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

/// Streaming chat session over a [`CompanionApi`].
///
/// Dropping the session closes any open reply stream.
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    /// Create a session with empty history.
    pub fn new(api: Arc<dyn CompanionApi>, auth: Arc<dyn AuthProvider>) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                session_id: Uuid::new_v4().simple().to_string(),
                api,
                auth,
                state: Mutex::new(SessionState::default()),
                updates,
            }),
        }
    }

    /// Create a session and load the latest conversation into it.
    pub async fn connect(api: Arc<dyn CompanionApi>, auth: Arc<dyn AuthProvider>) -> Self {
        let session = Self::new(api, auth);
        session.load_history().await;
        session
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receive a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn has_open_stream(&self) -> bool {
        self.shared.lock().active_stream_id().is_some()
    }

    /// Wait until no reply is pending and return the settled snapshot.
    ///
    /// Never resolves while a stream stays open without sending events.
    pub async fn settled(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| !s.is_loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Replace local history with the caller's most recent conversation.
    ///
    /// Signed-out callers get an empty session. Failures leave history empty
    /// and set a non-blocking error; nothing is returned to the caller.
    pub async fn load_history(&self) {
        let shared = &self.shared;
        if !shared.auth.is_authenticated() {
            let mut state = shared.lock();
            state.replace_history(None);
            state.error = None;
            shared.publish(&state);
            return;
        }

        let epoch = shared.lock().send_seq;
        let loaded = async {
            let token = shared.auth.token().await?;
            shared.api.fetch_history(&token).await?.into_latest()
        }
        .await;

        let mut state = shared.lock();
        if state.send_seq != epoch {
            debug!(session = %shared.session_id, "Discarding history load overtaken by a send");
            return;
        }

        match loaded {
            Ok(latest) => {
                let count = latest.as_ref().map_or(0, |(_, messages)| messages.len());
                state.replace_history(latest);
                state.error = None;
                info!(session = %shared.session_id, messages = count, "Chat history loaded");
            }
            Err(e) => {
                warn!(session = %shared.session_id, error = %e, "Failed to load chat history");
                state.replace_history(None);
                state.error = Some(HISTORY_FAILED.to_string());
                shared.record_failure("history", &e);
            }
        }
        shared.publish(&state);
    }

    /// Send a user message and start streaming the reply.
    ///
    /// Blank text is ignored. The message appears in history immediately and
    /// is removed again if the token or the POST fails.
    pub async fn send_message(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let shared = &self.shared;
        if !shared.auth.is_authenticated() {
            let mut state = shared.lock();
            state.error = Some(SIGN_IN_REQUIRED.to_string());
            shared.publish(&state);
            return;
        }

        let (seq, sent_at, conversation_id) = {
            let mut state = shared.lock();
            state.send_seq += 1;
            let sent_at = state.push_user_message(text);
            state.is_loading = true;
            state.error = None;
            shared.publish(&state);
            (state.send_seq, sent_at, state.conversation_id.clone())
        };

        let token = match shared.auth.token().await {
            Ok(token) => token,
            Err(e) => {
                shared.roll_back(seq, sent_at, AUTH_FAILED, "auth", &e);
                return;
            }
        };

        ChatEventLogger::log_event(
            &shared.session_id,
            ChatEvent::MessageSent {
                conversation_id: conversation_id.as_ref().map(ToString::to_string),
                chars: text.chars().count(),
            },
        );

        let request = SendRequest {
            message: text.to_string(),
            conversation_id,
        };
        match shared.api.send_message(&token, &request).await {
            Ok(response) => shared.begin_stream(seq, response.conversation_id, token),
            Err(e) => shared.roll_back(seq, sent_at, SEND_FAILED, "send", &e),
        }
    }

    /// Close the live reply stream, if any. Safe to call repeatedly.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if let Some(stream_id) = state.close_stream() {
            state.is_loading = false;
            ChatEventLogger::log_event(
                &self.shared.session_id,
                ChatEvent::StreamClosed {
                    stream_id,
                    reason: "closed by client".into(),
                },
            );
            self.shared.publish(&state);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }

    fn record_failure(&self, stage: &str, error: &ChatError) {
        ChatEventLogger::log_event(
            &self.session_id,
            ChatEvent::Failure {
                stage: stage.into(),
                error_msg: error.to_string(),
            },
        );
    }

    /// Undo an optimistic send.
    fn roll_back(
        &self,
        seq: u64,
        sent_at: DateTime<Utc>,
        message: &str,
        stage: &str,
        error: &ChatError,
    ) {
        warn!(session = %self.session_id, stage, error = %error, "Send failed, rolling back");
        let mut state = self.lock();
        state.remove_user_message(sent_at);
        state.error = Some(message.to_string());
        state.finish_loading(seq);
        self.publish(&state);
        self.record_failure(stage, error);
    }

    /// Adopt the backend's conversation id and replace the live stream.
    fn begin_stream(self: &Arc<Self>, seq: u64, conversation_id: ConversationId, token: String) {
        let mut state = self.lock();
        // An overtaken send still confirms which conversation it joined.
        let adopted = state.adopt_conversation(seq, conversation_id.clone());
        if seq != state.send_seq {
            debug!(
                session = %self.session_id,
                seq,
                latest = state.send_seq,
                adopted,
                "Send superseded before its stream opened"
            );
            if adopted {
                self.publish(&state);
            }
            return;
        }

        if let Some(previous) = state.close_stream() {
            debug!(session = %self.session_id, stream_id = previous, "Replacing reply stream");
        }

        state.next_stream_id += 1;
        let stream_id = state.next_stream_id;
        // Spawned under the lock: the task cannot touch state before its
        // handle is installed.
        let task = tokio::spawn(Arc::clone(self).consume(stream_id, conversation_id.clone(), token));
        state.stream = Some(StreamHandle::new(stream_id, seq, task.abort_handle()));
        self.publish(&state);

        ChatEventLogger::log_event(
            &self.session_id,
            ChatEvent::StreamOpened {
                conversation_id: conversation_id.to_string(),
                stream_id,
            },
        );
    }

    /// Drive one reply stream until a terminal event or transport failure.
    async fn consume(self: Arc<Self>, stream_id: u64, conversation_id: ConversationId, token: String) {
        let mut events = match self.api.open_stream(&conversation_id, &token).await {
            Ok(events) => events,
            Err(e) => {
                self.fail_stream(stream_id, &e);
                return;
            }
        };

        while let Some(frame) = events.next().await {
            let payload = match frame {
                Ok(payload) => payload,
                Err(e) => {
                    self.fail_stream(stream_id, &e);
                    return;
                }
            };

            let event = match StreamEvent::decode(&payload) {
                Ok(event) => event,
                Err(e) => {
                    let shown: String = payload.chars().take(MAX_LOGGED_PAYLOAD).collect();
                    warn!(stream_id, error = %e, payload = %shown, "Ignoring malformed stream event");
                    continue;
                }
            };

            if !self.apply_event(stream_id, event) {
                return;
            }
        }

        self.fail_stream(
            stream_id,
            &ChatError::Stream("stream ended before completion".into()),
        );
    }

    /// Apply one event. Returns false once the stream is closed.
    fn apply_event(&self, stream_id: u64, event: StreamEvent) -> bool {
        let mut state = self.lock();
        let Some(seq) = state
            .stream
            .as_ref()
            .filter(|h| h.id() == stream_id)
            .map(StreamHandle::seq)
        else {
            debug!(stream_id, %event, "Dropping event from a closed stream");
            return false;
        };

        let reason = match event {
            StreamEvent::Token { content } => {
                state.append_token(stream_id, &content);
                self.publish(&state);
                return true;
            }
            StreamEvent::Complete => "complete".to_string(),
            StreamEvent::Error { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| STREAM_ERROR_DEFAULT.to_string());
                warn!(session = %self.session_id, stream_id, error = %message, "Companion reported an error");
                state.error = Some(message.clone());
                format!("error: {message}")
            }
        };

        state.finish_loading(seq);
        state.close_stream();
        self.publish(&state);
        ChatEventLogger::log_event(
            &self.session_id,
            ChatEvent::StreamClosed { stream_id, reason },
        );
        false
    }

    /// Treat a transport failure like an error event with a fixed message.
    fn fail_stream(&self, stream_id: u64, error: &ChatError) {
        let mut state = self.lock();
        let Some(seq) = state
            .stream
            .as_ref()
            .filter(|h| h.id() == stream_id)
            .map(StreamHandle::seq)
        else {
            return;
        };

        warn!(session = %self.session_id, stream_id, error = %error, "Reply stream failed");
        state.error = Some(CONNECTION_LOST.to_string());
        state.finish_loading(seq);
        state.close_stream();
        self.publish(&state);
        self.record_failure("stream", error);
    }
}
