//! Session update types and broadcasting for observers.
//!
//! The controller publishes one [`SessionUpdate`] per observable change so
//! that any number of observers (a terminal renderer, a log sink, a test) can
//! follow a session without touching its state.
//!
//! # Event Types
//!
//! - `started` - A session went in flight, includes its parameters
//! - `progress` - Progress advanced
//! - `succeeded` - Output arrived, includes the composed result
//! - `failed` - Server error or transport failure
//! - `cancelled` - The owner cancelled an in-flight session
//!
//! # Example
//!
//! ```no_run
//! use diro_session::updates::{SessionUpdate, UpdateBroadcaster};
//!
//! # async fn example() {
//! let broadcaster = UpdateBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionUpdate::progress(40.0));
//!
//! if let Ok(update) = receiver.recv().await {
//!     println!("Received: {}", update.event_name());
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::params::GenerationParams;
use crate::session_state::progress_caption;

// ============================================================================
// Update Payloads
// ============================================================================

/// Payload for the `started` update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedPayload {
    /// The parameters the session runs with.
    pub parameters: GenerationParams,
    /// The first decorative message index.
    pub message_index: usize,
}

/// Payload for the `progress` update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Progress percentage.
    pub progress: f64,
    /// Progress rounded for display.
    pub percent: u8,
    /// Caption for the current progress band.
    pub caption: String,
}

/// Payload for the `succeeded` update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SucceededPayload {
    /// The composed result text.
    pub result: String,
}

/// Payload for the `failed` update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPayload {
    /// Human-readable failure message.
    pub message: String,
}

// ============================================================================
// Update Enum
// ============================================================================

/// Observable session changes.
///
/// All updates are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// A session went in flight.
    Started(StartedPayload),
    /// Progress advanced.
    Progress(ProgressPayload),
    /// Output arrived.
    Succeeded(SucceededPayload),
    /// The session failed.
    Failed(FailedPayload),
    /// The session was cancelled.
    Cancelled,
}

impl SessionUpdate {
    /// Creates a `Started` update.
    #[must_use]
    pub const fn started(parameters: GenerationParams, message_index: usize) -> Self {
        Self::Started(StartedPayload {
            parameters,
            message_index,
        })
    }

    /// Creates a `Progress` update with its display fields filled in.
    #[must_use]
    pub fn progress(progress: f64) -> Self {
        // The reducer keeps progress in [0, 100].
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = progress.clamp(0.0, 100.0).round() as u8;
        Self::Progress(ProgressPayload {
            progress,
            percent,
            caption: progress_caption(progress).to_string(),
        })
    }

    /// Creates a `Succeeded` update.
    #[must_use]
    pub fn succeeded(result: impl Into<String>) -> Self {
        Self::Succeeded(SucceededPayload {
            result: result.into(),
        })
    }

    /// Creates a `Failed` update.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(FailedPayload {
            message: message.into(),
        })
    }

    /// Returns `true` if no further updates follow for this session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::Failed(_) | Self::Cancelled
        )
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started(_) => "started",
            Self::Progress(_) => "progress",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// Update Broadcaster
// ============================================================================

/// Broadcasts session updates to every subscribed observer.
///
/// Updates are not replayed for late subscribers.
#[derive(Debug, Clone)]
pub struct UpdateBroadcaster {
    sender: broadcast::Sender<SessionUpdate>,
}

impl UpdateBroadcaster {
    /// Creates a broadcaster with the given per-subscriber buffer.
    ///
    /// A zero capacity is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// the oldest updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.sender.subscribe()
    }

    /// Broadcasts an update and returns how many subscribers will see it.
    pub fn send(&self, update: SessionUpdate) -> usize {
        // Err only means nobody is subscribed
        self.sender.send(update).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// Tests
// ============================================================================
