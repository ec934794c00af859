//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only unnamed events (or events named `message`) are dispatched; named
//! events such as `heartbeat` are consumed and dropped. `id` and `retry`
//! fields and comment lines are ignored. Multi-line data is joined with `\n`
//! as the event-stream format requires.

use futures::stream::{self, Stream, StreamExt};

/// Event type dispatched when no `event` field is given.
const DEFAULT_EVENT_TYPE: &str = "message";

/// Splits a byte stream into dispatched `data` payloads.
///
/// Lines end with `\r\n`, `\n` or a lone `\r`. Chunks may end anywhere,
/// including inside a UTF-8 sequence or between `\r` and `\n`; bytes are
/// buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// The previous chunk ended on `\r`; a leading `\n` belongs to it.
    pending_cr: bool,
    event_type: String,
    data: Vec<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut chunk = chunk;
        if self.pending_cr && !chunk.is_empty() {
            self.pending_cr = false;
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut dispatched = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| matches!(b, b'\n' | b'\r')) {
            let terminator = self.buffer[end];
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if terminator == b'\r' {
                match self.buffer.first() {
                    Some(b'\n') => {
                        self.buffer.remove(0);
                    }
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                dispatched.push(event);
            }
        }
        dispatched
    }

    /// Returns `true` if a partially received event is buffered.
    ///
    /// An event only counts once its terminating blank line arrives, so a
    /// stream that ends here has lost it.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            let event_type = std::mem::take(&mut self.event_type);
            let data = std::mem::take(&mut self.data);
            if data.is_empty() {
                return None;
            }
            if !event_type.is_empty() && event_type != DEFAULT_EVENT_TYPE {
                return None;
            }
            return Some(data.join("\n"));
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
            "event" => self.event_type = value.to_string(),
            _ => {}
        }
        None
    }
}

/// Adapts a chunked byte stream into a stream of event `data` payloads.
///
/// Transport errors are passed through in order.
pub fn data_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    bytes
        .scan(SseDecoder::new(), |decoder, chunk| {
            let items: Vec<Result<String, E>> = match chunk {
                Ok(chunk) => decoder.push(chunk.as_ref()).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            futures::future::ready(Some(stream::iter(items)))
        })
        .flatten()
}
