//! Companion backend transports.

pub mod http;
pub mod mock;
pub mod sse;
