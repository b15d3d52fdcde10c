//! Incremental `text/event-stream` decoding.

use std::collections::VecDeque;
use std::fmt::Display;

use futures::{stream, Stream, StreamExt};
use tracing::debug;

use sidequest_core::{ChatError, EventStream};
use sidequest_logging::redact_sensitive_data;

/// Event name delivered to `onmessage` handlers.
const DEFAULT_EVENT: &str = "message";

/// Turns raw body chunks into `data` payloads, one per dispatched event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the payloads it completed.
    ///
    /// Chunks may split lines anywhere, including inside a UTF-8 sequence.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id and retry only matter for reconnection, which is never attempted
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let payload = std::mem::take(&mut self.data).join("\n");

        match event.as_deref() {
            None | Some("") | Some(DEFAULT_EVENT) => Some(payload),
            Some(name) => {
                debug!(event = name, "Skipping named stream event");
                None
            }
        }
    }
}

/// Adapt a byte stream into a stream of event payloads.
///
/// A body error ends the stream after yielding it as [`ChatError::Stream`].
pub fn data_frames<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let init = (Box::pin(body), SseDecoder::new(), VecDeque::new(), false);
    Box::pin(stream::unfold(
        init,
        |(mut body, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (body, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.feed(chunk.as_ref())),
                    Some(Err(e)) => {
                        done = true;
                        let error = ChatError::Stream(redact_sensitive_data(&e.to_string()));
                        return Some((Err(error), (body, decoder, pending, done)));
                    }
                    None => done = true,
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &'static str) -> Result<&'static [u8], String> {
        Ok(text.as_bytes())
    }

    #[test]
    fn payloads_survive_arbitrary_chunking() {
        let body = "data: {\"type\":\"token\",\"content\":\"Hi\"}\n\ndata: {\"type\":\"complete\"}\n\n";
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for chunk in body.as_bytes().chunks(3) {
            frames.extend(decoder.feed(chunk));
        }
        assert_eq!(
            frames,
            vec![
                r#"{"type":"token","content":"Hi"}"#.to_string(),
                r#"{"type":"complete"}"#.to_string(),
            ]
        );
    }

    #[test]
    fn split_utf8_sequence_is_reassembled() {
        let body = "data: caf\u{e9}\n\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&body[..split]).is_empty());
        assert_eq!(decoder.feed(&body[split..]), vec!["caf\u{e9}".to_string()]);
    }

    #[test]
    fn crlf_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\r\ndata:first\r\ndata: second\r\nid: 4\r\n\r\n");
        assert_eq!(frames, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn named_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: ping\ndata: {}\n\nevent: message\ndata: kept\n\n");
        assert_eq!(frames, vec!["kept".to_string()]);
    }

    #[test]
    fn blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\nevent: ping\n\n").is_empty());
        // The event name does not leak into the next event.
        assert_eq!(decoder.feed(b"data: x\n\n"), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn unterminated_event_is_dropped_at_eof() {
        let chunks = vec![chunk("data: one\n\n"), chunk("data: two")];
        let frames: Vec<_> = data_frames(stream::iter(chunks)).collect().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap(), "one");
    }

    #[tokio::test]
    async fn body_error_is_redacted_and_ends_stream() {
        let chunks = vec![
            chunk("data: one\n\n"),
            Err("reset while reading /stream/c1?token=secret123".to_string()),
            chunk("data: never\n\n"),
        ];
        let frames: Vec<_> = data_frames(stream::iter(chunks)).collect().await;
        assert_eq!(frames.len(), 2);
        let message = frames[1].as_ref().unwrap_err().to_string();
        assert!(!message.contains("secret123"));
        assert!(matches!(frames[1], Err(ChatError::Stream(_))));
    }
}
