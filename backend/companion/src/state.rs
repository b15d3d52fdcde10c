//! Session state owned by the chat controller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sidequest_core::{next_timestamp, ConversationId, Message, Role};

use crate::stream::StreamHandle;

/// Read-only view of a session, published after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub conversation_id: Option<ConversationId>,
    /// Awaiting the assistant's reply
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// The newest assistant message, if any.
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

/// Mutable session state. Only the controller and its stream task touch it,
/// always under the session lock.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) messages: Vec<Message>,
    pub(crate) conversation_id: Option<ConversationId>,
    pub(crate) is_loading: bool,
    pub(crate) error: Option<String>,
    /// Bumped by every accepted `send_message`
    pub(crate) send_seq: u64,
    /// Send whose returned conversation id was adopted last
    pub(crate) adopted_seq: u64,
    pub(crate) next_stream_id: u64,
    pub(crate) stream: Option<StreamHandle>,
}

impl SessionState {
    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            conversation_id: self.conversation_id.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }

    pub(crate) fn active_stream_id(&self) -> Option<u64> {
        self.stream.as_ref().map(StreamHandle::id)
    }

    /// Append a user message with a fresh, unique timestamp.
    pub(crate) fn push_user_message(&mut self, text: &str) -> DateTime<Utc> {
        let timestamp = next_timestamp(&self.messages);
        self.messages.push(Message::user(text, timestamp));
        timestamp
    }

    /// Remove the optimistic user message sent at `timestamp`.
    pub(crate) fn remove_user_message(&mut self, timestamp: DateTime<Utc>) -> bool {
        let before = self.messages.len();
        self.messages
            .retain(|m| !(m.role == Role::User && m.timestamp == timestamp));
        self.messages.len() != before
    }

    /// Append a token to the in-flight reply of `stream_id`, creating the
    /// reply on the first token. Returns false if that stream is not active.
    pub(crate) fn append_token(&mut self, stream_id: u64, fragment: &str) -> bool {
        let Some(handle) = self.stream.as_mut().filter(|h| h.id() == stream_id) else {
            return false;
        };

        if let Some(marker) = handle.marker() {
            if let Some(reply) = self
                .messages
                .iter_mut()
                .rev()
                .find(|m| m.is_reply_marked(marker))
            {
                reply.content.push_str(fragment);
                return true;
            }
        }

        let timestamp = next_timestamp(&self.messages);
        self.messages.push(Message::assistant(fragment, timestamp));
        handle.set_marker(timestamp);
        true
    }

    /// Take the live stream out of the state, closing it. Returns its id.
    pub(crate) fn close_stream(&mut self) -> Option<u64> {
        self.stream.take().map(|handle| handle.id())
    }

    /// Adopt a conversation id returned for send `seq`, unless a later
    /// send's id is already in place.
    pub(crate) fn adopt_conversation(&mut self, seq: u64, id: ConversationId) -> bool {
        if seq <= self.adopted_seq {
            return false;
        }
        self.adopted_seq = seq;
        self.conversation_id = Some(id);
        true
    }

    /// Clear the loading flag unless a newer send than `seq` is pending.
    pub(crate) fn finish_loading(&mut self, seq: u64) {
        if seq == self.send_seq {
            self.is_loading = false;
        }
    }

    /// Replace history with a loaded conversation.
    pub(crate) fn replace_history(&mut self, latest: Option<(ConversationId, Vec<Message>)>) {
        match latest {
            Some((id, messages)) => {
                self.conversation_id = Some(id);
                self.messages = messages;
            }
            None => {
                self.conversation_id = None;
                self.messages.clear();
            }
        }
    }
}
