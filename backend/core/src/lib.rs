pub mod error;
pub mod event;
pub mod message;
pub mod traits;
pub mod wire;

pub use error::ChatError;
pub use event::StreamEvent;
pub use message::{next_timestamp, ConversationId, Message, Role};
pub use traits::{AuthProvider, CompanionApi, EventStream};
pub use wire::{
    ConversationRecord, HistoryResponse, SendRequest, SendResponse, WireMessage,
};
