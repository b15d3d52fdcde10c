//! Terminal output utilities: ANSI formatting, notes, transcript lines,
//! stream writing.

use std::io::Write;

use sidequest_core::{Message, Role};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const MAGENTA: &str = "\x1b[35m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Formatted notes
// ---------------------------------------------------------------------------

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

/// Print a formatted ERROR note to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Speaker label shown before a turn.
pub fn speaker(role: Role, color: bool) -> String {
    let (label, tint) = match role {
        Role::User => ("you", GREEN),
        Role::Assistant => ("companion", MAGENTA),
    };
    if color {
        format!("{tint}{BOLD}{label}{RESET}")
    } else {
        label.to_string()
    }
}

/// One transcript line: local time, speaker and content.
pub fn format_turn(message: &Message, color: bool) -> String {
    let time = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    let who = speaker(message.role, color);
    if color {
        format!("{DIM}[{time}]{RESET} {who}: {}", message.content)
    } else {
        format!("[{time}] {who}: {}", message.content)
    }
}

// ---------------------------------------------------------------------------
// Streaming writer
// ---------------------------------------------------------------------------

/// Write a chunk and flush so partial replies show up immediately.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}
