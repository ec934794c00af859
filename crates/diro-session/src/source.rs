//! The push-channel capability the controller subscribes through.
//!
//! [`EventSource`] hides the transport: the controller only sees a
//! [`Subscription`] yielding raw `data` payloads and a close operation. The
//! production implementation is [`SseEventSource`]; tests inject scripted
//! sources instead.

use std::fmt;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::ACCEPT;

use crate::error::{DiroError, Result};
use crate::params::GenerationRequest;
use crate::sse::data_events;

/// Path of the streaming generation endpoint.
pub const GENERATE_STREAM_PATH: &str = "/api/generate_stream";

/// Opens one push subscription per generation request.
pub trait EventSource: Send + Sync {
    /// Opens a subscription for `request`.
    ///
    /// Connection failures are reported as an `Err` item on the returned
    /// subscription rather than here, so opening never fails.
    fn subscribe(&self, request: &GenerationRequest) -> Subscription;
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// One live push-channel connection.
///
/// Closing drops the underlying stream, which releases the connection, and
/// runs the close hook exactly once. Dropping a subscription closes it.
pub struct Subscription {
    stream: Option<BoxStream<'static, Result<String>>>,
    on_close: Option<CloseHook>,
}

impl Subscription {
    /// Wraps a stream of raw `data` payloads.
    pub fn new(stream: impl Stream<Item = Result<String>> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.boxed()),
            on_close: None,
        }
    }

    /// Registers a callback run when the subscription closes.
    #[must_use]
    pub fn with_close_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Waits for the next payload.
    ///
    /// Returns `None` once the stream has ended or the subscription is closed.
    pub async fn next(&mut self) -> Option<Result<String>> {
        self.stream.as_mut()?.next().await
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Closes the subscription. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.stream.take().is_none() {
            return false;
        }
        if let Some(hook) = self.on_close.take() {
            hook();
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Server-sent-events source for `GET /api/generate_stream`.
#[derive(Debug, Clone)]
pub struct SseEventSource {
    http: reqwest::Client,
    base_url: String,
}

impl SseEventSource {
    /// Creates a source for the backend at `base_url`.
    ///
    /// The client must not carry a total request timeout; generation streams
    /// stay open for as long as the backend works.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The full endpoint URL, without query parameters.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{GENERATE_STREAM_PATH}", self.base_url)
    }
}

impl EventSource for SseEventSource {
    fn subscribe(&self, request: &GenerationRequest) -> Subscription {
        let endpoint = self.endpoint();
        tracing::info!(endpoint = %endpoint, grade = %request.grade, "Opening generation stream");

        let pending = self
            .http
            .get(&endpoint)
            .query(&request.query_pairs())
            .header(ACCEPT, "text/event-stream");

        let payloads = stream::once(async move {
            match pending
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
            {
                Ok(response) => {
                    let endpoint = endpoint.clone();
                    data_events(response.bytes_stream())
                        .map(move |item| {
                            item.map_err(|e| DiroError::stream_transport(&endpoint, e.to_string()))
                        })
                        .boxed()
                }
                Err(e) => {
                    stream::iter([Err(DiroError::stream_transport(&endpoint, e.to_string()))])
                        .boxed()
                }
            }
        })
        .flatten();

        Subscription::new(payloads)
    }
}
