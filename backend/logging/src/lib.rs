//! Telemetry and structured logging for the SideQuest companion client.
//!
//! Handles log redaction, console/JSON output, file rotation, and chat
//! session event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{ChatEvent, ChatEventLogger, EventLogEntry};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
