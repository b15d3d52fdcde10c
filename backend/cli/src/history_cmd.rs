//! CLI History Command
//!
//! Prints the caller's most recent conversation.

use anyhow::{bail, Result};

use sidequest_companion::{ChatSession, SessionSnapshot};

use crate::terminal_output::{format_turn, note_info, supports_color};

pub fn print_transcript(snapshot: &SessionSnapshot) {
    if snapshot.messages.is_empty() {
        note_info("No messages yet.");
        return;
    }
    if let Some(id) = &snapshot.conversation_id {
        note_info(&format!("Conversation {id}"));
    }
    let color = supports_color();
    for message in &snapshot.messages {
        println!("{}", format_turn(message, color));
    }
}

pub fn run(session: &ChatSession) -> Result<()> {
    let snapshot = session.snapshot();
    if let Some(error) = &snapshot.error {
        bail!("{error}");
    }
    print_transcript(&snapshot);
    Ok(())
}
