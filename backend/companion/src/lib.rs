//! Streaming companion chat for SideQuest.
//!
//! [`ChatSession`] owns a conversation's history, sends user messages with
//! optimistic updates, and relays the assistant's reply from a server-push
//! stream. Transports live under [`api`]; token sources under [`auth`].

pub mod api;
pub mod auth;
pub mod session;
pub mod state;
mod stream;

pub use api::http::{HttpCompanionApi, HttpOptions};
pub use api::mock::MockCompanionApi;
pub use auth::{SignedOut, StaticTokenAuth};
pub use session::ChatSession;
pub use state::SessionSnapshot;
