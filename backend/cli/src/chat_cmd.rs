//! CLI Chat Command
//!
//! Interactive companion chat on stdin, plus the one-shot `send` path.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use sidequest_companion::{ChatSession, SessionSnapshot};
use sidequest_core::Role;

use crate::history_cmd::print_transcript;
use crate::terminal_output::{note_error, note_info, note_warn, speaker, stream_write, supports_color};

/// Prints the assistant reply to one send as it grows.
///
/// The reply is the first assistant message newer than the history the
/// send started from; tokens only ever append, so a byte offset is enough.
pub struct ReplyPrinter {
    after: Option<DateTime<Utc>>,
    printed: usize,
}

impl ReplyPrinter {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            after: snapshot.messages.last().map(|m| m.timestamp),
            printed: 0,
        }
    }

    /// Reply text not yet printed, if any.
    pub fn next_chunk<'a>(&mut self, snapshot: &'a SessionSnapshot) -> Option<&'a str> {
        let reply = snapshot.messages.iter().find(|m| {
            m.role == Role::Assistant && self.after.map_or(true, |after| m.timestamp > after)
        })?;
        let fresh = reply.content.get(self.printed..)?;
        if fresh.is_empty() {
            return None;
        }
        self.printed = reply.content.len();
        Some(fresh)
    }

    pub fn has_printed(&self) -> bool {
        self.printed > 0
    }
}

/// Send one message and print the reply until the session settles.
///
/// Ctrl-C closes the reply stream and keeps whatever already arrived.
pub async fn exchange(session: &ChatSession, text: &str) -> Result<SessionSnapshot> {
    let mut updates = session.subscribe();
    let mut printer = ReplyPrinter::new(&session.snapshot());
    let mut stdout = std::io::stdout();

    session.send_message(text).await;

    loop {
        let snapshot = updates.borrow_and_update().clone();
        let started = printer.has_printed();
        if let Some(chunk) = printer.next_chunk(&snapshot) {
            if !started {
                let label = speaker(Role::Assistant, supports_color());
                stream_write(&mut stdout, &format!("{label}: "))?;
            }
            stream_write(&mut stdout, chunk)?;
        }
        if !snapshot.is_loading {
            if printer.has_printed() {
                println!();
            }
            return Ok(snapshot);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(session.snapshot());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.close();
                if printer.has_printed() {
                    println!();
                }
                note_warn("Reply cancelled.");
                return Ok(session.snapshot());
            }
        }
    }
}

/// `sidequest send <TEXT>`: fails when the exchange ends in an error.
pub async fn send_once(session: &ChatSession, text: &str) -> Result<()> {
    let snapshot = exchange(session, text).await?;
    if let Some(error) = snapshot.error {
        bail!("{error}");
    }
    Ok(())
}

pub async fn run(session: &ChatSession) -> Result<()> {
    if let Some(error) = session.snapshot().error {
        note_error(&error);
    }
    note_info("Chatting with your companion. /history shows the conversation, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    loop {
        stream_write(&mut stdout, "> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => print_transcript(&session.snapshot()),
            text => {
                let snapshot = exchange(session, text).await?;
                if let Some(error) = &snapshot.error {
                    note_error(error);
                }
            }
        }
    }

    debug!(session = session.session_id(), "Chat loop finished");
    session.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sidequest_core::Message;

    fn snapshot(messages: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn prints_only_new_reply_text() {
        let t0 = Utc::now();
        let before = snapshot(vec![Message::assistant("old reply", t0)]);
        let mut printer = ReplyPrinter::new(&before);

        let user = Message::user("hi", t0 + Duration::microseconds(1));
        let mut growing = vec![before.messages[0].clone(), user];
        assert_eq!(printer.next_chunk(&snapshot(growing.clone())), None);

        growing.push(Message::assistant("Hi", t0 + Duration::microseconds(2)));
        assert_eq!(printer.next_chunk(&snapshot(growing.clone())), Some("Hi"));
        assert_eq!(printer.next_chunk(&snapshot(growing.clone())), None);

        growing[2].content.push_str(" there");
        assert_eq!(printer.next_chunk(&snapshot(growing)), Some(" there"));
        assert!(printer.has_printed());
    }

    #[test]
    fn empty_history_accepts_first_reply() {
        let mut printer = ReplyPrinter::new(&SessionSnapshot::default());
        let now = Utc::now();
        let snap = snapshot(vec![Message::user("a", now), Message::assistant("b", now)]);
        assert_eq!(printer.next_chunk(&snap), Some("b"));
    }
}
