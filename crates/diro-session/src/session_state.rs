//! Session state types for the generation session controller.
//!
//! This module defines the session status machine and the pure reducer that
//! folds [`SessionEvent`]s into a [`SessionState`]. Rendering and transport
//! concerns live elsewhere; everything here can be driven directly in tests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::SessionEvent;
use crate::params::GenerationParams;

/// Message recorded when the stream fails without a server-supplied reason.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "An error occurred while generating the material.";

/// Message recorded when an in-flight session is cancelled.
pub const CANCELLED_MESSAGE: &str = "Generation cancelled.";

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle status of a generation session.
///
/// The status transitions through these states:
/// - `Idle` -> `InFlight` (session started)
/// - From `InFlight`:
///   - `Succeeded` (output received)
///   - `Failed` (server error, transport failure, or cancellation)
///
/// Terminal states are left only by starting a new session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been started.
    #[default]
    Idle,
    /// Waiting for the generation stream to finish.
    InFlight,
    /// Output was received.
    Succeeded,
    /// The session ended without output.
    Failed,
}

impl SessionStatus {
    /// Returns `true` if this status represents a terminal state.
    ///
    /// # Examples
    ///
    /// ```
    /// use diro_session::SessionStatus;
    ///
    /// assert!(SessionStatus::Succeeded.is_terminal());
    /// assert!(SessionStatus::Failed.is_terminal());
    /// assert!(!SessionStatus::InFlight.is_terminal());
    /// assert!(!SessionStatus::Idle.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::InFlight => "in flight",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Observable state of one generation session.
///
/// Owned exclusively by the controller; observers get a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Current status.
    pub status: SessionStatus,

    /// Progress percentage in `[0, 100]`.
    pub progress: f64,

    /// Final text, present only when `Succeeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Failure description, present only when `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Parameters captured when the session started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<GenerationParams>,

    /// When the session started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the session reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates an `Idle` state with no session history.
    ///
    /// # Examples
    ///
    /// ```
    /// use diro_session::{SessionState, SessionStatus};
    ///
    /// let state = SessionState::new();
    /// assert_eq!(state.status, SessionStatus::Idle);
    /// assert_eq!(state.progress, 0.0);
    /// assert!(state.result.is_none());
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: SessionStatus::Idle,
            progress: 0.0,
            result: None,
            error_message: None,
            parameters: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns the state of a freshly started session.
    ///
    /// Progress is reset and any prior result or error is discarded.
    #[must_use]
    pub fn begin(params: GenerationParams) -> Self {
        Self {
            status: SessionStatus::InFlight,
            parameters: Some(params),
            started_at: Some(Utc::now()),
            ..Self::new()
        }
    }

    /// Returns `true` if the session is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns `true` while the session is waiting on the stream.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.status == SessionStatus::InFlight
    }

    /// Folds one event into the state.
    ///
    /// Only an `InFlight` state reacts; every other state is returned
    /// unchanged. Progress is clamped to `[0, 100]` and never decreases.
    /// Every terminal event forces progress to 100.
    #[must_use]
    pub fn reduce(self, event: SessionEvent) -> Self {
        if !self.is_in_flight() {
            return self;
        }

        match event {
            SessionEvent::Progress(value) => {
                if !value.is_finite() {
                    return self;
                }
                let progress = value.clamp(0.0, 100.0).max(self.progress);
                Self { progress, ..self }
            }
            SessionEvent::Output(output) => {
                let result = match &self.parameters {
                    Some(params) => params.compose_result(&output),
                    None => output,
                };
                Self {
                    result: Some(result),
                    ..self.finish(SessionStatus::Succeeded)
                }
            }
            SessionEvent::ServerError(message) => Self {
                error_message: Some(message),
                ..self.finish(SessionStatus::Failed)
            },
            SessionEvent::TransportFailure(_) => Self {
                error_message: Some(TRANSPORT_FAILURE_MESSAGE.to_string()),
                ..self.finish(SessionStatus::Failed)
            },
            SessionEvent::Cancelled => Self {
                error_message: Some(CANCELLED_MESSAGE.to_string()),
                ..self.finish(SessionStatus::Failed)
            },
        }
    }

    fn finish(self, status: SessionStatus) -> Self {
        Self {
            status,
            progress: 100.0,
            finished_at: Some(Utc::now()),
            ..self
        }
    }

    /// Progress rounded to a whole percentage for display.
    #[must_use]
    pub fn display_progress(&self) -> u8 {
        // Clamped to [0, 100] by the reducer, so the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = self.progress.clamp(0.0, 100.0).round() as u8;
        rounded
    }

    /// A status caption matching the current progress band.
    #[must_use]
    pub fn progress_caption(&self) -> &'static str {
        progress_caption(self.progress)
    }

    /// Time between start and finish, or until now while still running.
    #[must_use]
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let started = self.started_at?;
        Some(self.finished_at.unwrap_or_else(Utc::now) - started)
    }
}

/// Maps a progress percentage to a short status caption.
///
/// # Examples
///
/// ```
/// use diro_session::session_state::progress_caption;
///
/// assert_eq!(progress_caption(0.0), "Analyzing chapters...");
/// assert_eq!(progress_caption(100.0), "Done!");
/// ```
#[must_use]
pub fn progress_caption(progress: f64) -> &'static str {
    match progress {
        p if p < 20.0 => "Analyzing chapters...",
        p if p < 40.0 => "Retrieving context...",
        p if p < 60.0 => "Crafting questions...",
        p if p < 75.0 => "Checking every chapter is covered...",
        p if p < 90.0 => "Formatting section marks...",
        p if p < 100.0 => "Reviewing for quality...",
        _ => "Done!",
    }
}

// ============================================================================
// Tests
// ============================================================================
