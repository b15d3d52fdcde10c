use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::debug;

/// Ownership of the one live reply stream.
///
/// Dropping the handle aborts the consumer task, which drops the transport
/// body with it, so a stream is closed exactly once by whoever takes it out
/// of the session state.
pub(crate) struct StreamHandle {
    id: u64,
    /// Sequence number of the send that opened this stream
    seq: u64,
    /// Timestamp of the assistant message this stream is filling in
    marker: Option<DateTime<Utc>>,
    abort: AbortHandle,
}

impl StreamHandle {
    pub(crate) fn new(id: u64, seq: u64, abort: AbortHandle) -> Self {
        Self {
            id,
            seq,
            marker: None,
            abort,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn marker(&self) -> Option<DateTime<Utc>> {
        self.marker
    }

    pub(crate) fn set_marker(&mut self, marker: DateTime<Utc>) {
        self.marker = Some(marker);
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.abort.abort();
        debug!(stream_id = self.id, "Reply stream closed");
    }
}
