//! Pushed payloads from the generation stream and the events they map to.
//!
//! Each server-sent `data:` block is expected to be a JSON object with any of
//! the optional fields `progress`, `output` and `error`. Payloads that are
//! not JSON objects, or that carry none of the recognised fields, produce no
//! event and are skipped by the controller.

use serde_json::Value;

/// A decoded generation-stream payload.
///
/// Fields with the wrong JSON type are treated as absent rather than making
/// the whole payload malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushedPayload {
    /// Progress percentage, if present and finite.
    pub progress: Option<f64>,
    /// Final generated text, if present and non-empty.
    pub output: Option<String>,
    /// Server-reported error, if present and non-empty.
    pub error: Option<String>,
}

impl PushedPayload {
    /// Decodes one `data:` block.
    ///
    /// Returns `None` if the text is not a JSON object.
    #[must_use]
    pub fn decode(data: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(data).ok()?;
        let object = value.as_object()?;

        let non_empty = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            progress: object
                .get("progress")
                .and_then(Value::as_f64)
                .filter(|p| p.is_finite()),
            output: non_empty("output"),
            error: non_empty("error"),
        })
    }

    /// Returns the single event this payload signals.
    ///
    /// A terminal signal wins over progress, and `output` wins over `error`.
    /// Returns `None` for a payload with no recognised signal.
    #[must_use]
    pub fn into_event(self) -> Option<SessionEvent> {
        if let Some(output) = self.output {
            return Some(SessionEvent::Output(output));
        }
        if let Some(error) = self.error {
            return Some(SessionEvent::ServerError(error));
        }
        self.progress.map(SessionEvent::Progress)
    }
}

/// Inputs to the session reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A progress report in percent.
    Progress(f64),
    /// The final generated text.
    Output(String),
    /// The server reported an error.
    ServerError(String),
    /// The subscription failed or closed without a terminal payload.
    TransportFailure(String),
    /// The session was cancelled by its owner.
    Cancelled,
}

impl SessionEvent {
    /// Returns `true` if this event ends an in-flight session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Decodes a pushed `data:` block straight into an event.
///
/// `None` covers both malformed and signal-free payloads.
#[must_use]
pub fn decode_event(data: &str) -> Option<SessionEvent> {
    PushedPayload::decode(data)?.into_event()
}
