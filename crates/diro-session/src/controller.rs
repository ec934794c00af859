//! The generation session controller.
//!
//! [`SessionController`] owns one session at a time: its state, its event
//! subscription and its decorative ticker. Every path that ends a session
//! (output, server error, transport failure, cancellation, replacement by a
//! new session, or dropping the controller) closes the subscription and stops
//! the ticker, and closing either twice is a no-op.
//!
//! # Example
//!
//! ```no_run
//! use diro_session::{ApiClient, GenerationForm, SessionController};
//! use std::time::Duration;
//!
//! # async fn example() -> diro_session::Result<()> {
//! let api = ApiClient::new("http://localhost:8000", Duration::from_secs(30));
//! let mut controller = SessionController::new(api.event_source());
//!
//! let mut form = GenerationForm::new();
//! form.set_grade("Grade 5").set_chapter("Fractions").set_material_type("Worksheet");
//! controller.start(&form)?;
//!
//! while let Some(update) = controller.next_update().await {
//!     println!("{}", update.event_name());
//! }
//! println!("{:?}", controller.result());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::event::{decode_event, SessionEvent};
use crate::params::{GenerationForm, GenerationParams};
use crate::session_state::{SessionState, SessionStatus};
use crate::source::{EventSource, Subscription};
use crate::ticker::{DecorativeTicker, RotatingMessages, TickerHandle};
use crate::updates::{SessionUpdate, UpdateBroadcaster};

/// Default decorative message rotation period.
pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_secs(5);

/// Drives one generation session at a time against an [`EventSource`].
///
/// All methods that start a session spawn the ticker task and must be called
/// from within a tokio runtime.
pub struct SessionController<S: EventSource> {
    source: S,
    messages: RotatingMessages,
    ticker: DecorativeTicker,
    state: SessionState,
    subscription: Option<Subscription>,
    ticker_handle: Option<TickerHandle>,
    updates: UpdateBroadcaster,
}

impl<S: EventSource> SessionController<S> {
    /// Creates an idle controller with the default messages and interval.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            messages: RotatingMessages::default(),
            ticker: DecorativeTicker::new(DEFAULT_MESSAGE_INTERVAL),
            state: SessionState::new(),
            subscription: None,
            ticker_handle: None,
            updates: UpdateBroadcaster::default(),
        }
    }

    /// Creates an idle controller using the configured interval and
    /// broadcast capacity.
    #[must_use]
    pub fn with_config(source: S, config: &Config) -> Self {
        let mut controller = Self::new(source);
        controller.ticker = DecorativeTicker::new(config.message_interval());
        controller.updates = UpdateBroadcaster::new(config.broadcast_capacity);
        controller
    }

    /// Replaces the decorative message list.
    #[must_use]
    pub fn with_messages(mut self, messages: RotatingMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Replaces the decorative rotation period.
    #[must_use]
    pub fn with_message_interval(mut self, period: Duration) -> Self {
        self.ticker = DecorativeTicker::new(period);
        self
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// The current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.state.status
    }

    /// Progress percentage in `[0, 100]`.
    #[must_use]
    pub const fn progress(&self) -> f64 {
        self.state.progress
    }

    /// Progress rounded for display.
    #[must_use]
    pub fn display_progress(&self) -> u8 {
        self.state.display_progress()
    }

    /// The composed result, present only after success.
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.state.result.as_deref()
    }

    /// The failure message, present only after failure.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.state.error_message.as_deref()
    }

    /// The decorative message list.
    #[must_use]
    pub const fn messages(&self) -> &RotatingMessages {
        &self.messages
    }

    /// The decorative message index; `None` unless a session is in flight.
    #[must_use]
    pub fn message_index(&self) -> Option<usize> {
        self.ticker_handle.as_ref().map(TickerHandle::index)
    }

    /// The decorative message text; `None` unless a session is in flight.
    #[must_use]
    pub fn current_message(&self) -> Option<&str> {
        self.message_index().map(|index| self.messages.get(index))
    }

    /// A receiver for decorative index changes of the running session.
    ///
    /// Reports closed once the session ends.
    #[must_use]
    pub fn watch_messages(&self) -> Option<watch::Receiver<usize>> {
        self.ticker_handle.as_ref().map(TickerHandle::subscribe)
    }

    /// Subscribes to session updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Returns `true` while a subscription is open.
    #[must_use]
    pub const fn has_live_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Returns `true` while the decorative ticker runs.
    #[must_use]
    pub const fn is_ticker_running(&self) -> bool {
        self.ticker_handle.is_some()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Validates the form and starts a session with it.
    ///
    /// On validation failure nothing changes: no subscription opens and the
    /// previous state, in flight or not, is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::InvalidParameter` if the form is incomplete.
    pub fn start(&mut self, form: &GenerationForm) -> Result<()> {
        let params = form.validate()?;
        self.start_with_params(params);
        Ok(())
    }

    /// Starts a session with already validated parameters.
    ///
    /// A session still in flight is cancelled first, so its subscription is
    /// closed before the new one opens.
    pub fn start_with_params(&mut self, params: GenerationParams) {
        if self.state.is_in_flight() {
            debug!("Replacing in-flight session");
            self.cancel();
        }
        self.teardown();

        let request = params.to_request();
        info!(
            grade = %params.grade(),
            chapter = %params.chapter(),
            material_type = %params.material_type(),
            "Starting generation session"
        );

        self.state = SessionState::begin(params.clone());
        self.subscription = Some(self.source.subscribe(&request));

        let start = self.messages.random_index();
        self.ticker_handle = Some(self.ticker.start(self.messages.len(), start));

        self.updates.send(SessionUpdate::started(params, start));
    }

    /// Waits for the next observable change of the in-flight session.
    ///
    /// Payloads without a usable signal are skipped. Returns `None` when no
    /// session is in flight. Cancel safe: dropping the future before it
    /// completes loses no payload.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if !self.state.is_in_flight() {
                return None;
            }
            let subscription = self.subscription.as_mut()?;

            let event = match subscription.next().await {
                Some(Ok(data)) => match decode_event(&data) {
                    Some(event) => event,
                    None => {
                        debug!(payload = %data, "Skipping payload without a usable signal");
                        continue;
                    }
                },
                Some(Err(e)) => {
                    warn!(error = %e, "Generation stream failed");
                    SessionEvent::TransportFailure(e.to_string())
                }
                None => {
                    warn!("Generation stream closed before any output");
                    SessionEvent::TransportFailure("stream closed before any output".to_string())
                }
            };

            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Drives the in-flight session to a terminal state.
    pub async fn run(&mut self) -> &SessionState {
        while self.next_update().await.is_some() {}
        &self.state
    }

    /// Cancels the in-flight session and releases its resources.
    ///
    /// An in-flight session becomes `Failed`; a terminal session keeps its
    /// result or error. Safe to call at any time and any number of times.
    /// Returns `true` if anything was cancelled or closed.
    pub fn cancel(&mut self) -> bool {
        let was_in_flight = self.state.is_in_flight();
        if was_in_flight {
            self.state = std::mem::take(&mut self.state).reduce(SessionEvent::Cancelled);
            info!("Generation session cancelled");
            self.updates.send(SessionUpdate::Cancelled);
        }
        let released = self.teardown();
        was_in_flight || released
    }

    /// Folds one event into the state and reports what changed.
    fn apply(&mut self, event: SessionEvent) -> Option<SessionUpdate> {
        let previous_progress = self.state.progress;
        self.state = std::mem::take(&mut self.state).reduce(event);

        let update = match self.state.status {
            SessionStatus::Succeeded => {
                self.teardown();
                info!(
                    elapsed_ms = self.state.elapsed().map(|d| d.num_milliseconds()),
                    "Generation succeeded"
                );
                SessionUpdate::succeeded(self.state.result.clone().unwrap_or_default())
            }
            SessionStatus::Failed => {
                self.teardown();
                let message = self.state.error_message.clone().unwrap_or_default();
                info!(error = %message, "Generation failed");
                SessionUpdate::failed(message)
            }
            SessionStatus::InFlight if self.state.progress > previous_progress => {
                debug!(progress = self.state.progress, "Generation progress");
                SessionUpdate::progress(self.state.progress)
            }
            _ => return None,
        };

        self.updates.send(update.clone());
        Some(update)
    }

    /// Closes the subscription and stops the ticker if either is live.
    fn teardown(&mut self) -> bool {
        let closed = self
            .subscription
            .take()
            .is_some_and(|mut subscription| subscription.close());
        let stopped = self.ticker_handle.take().is_some_and(|mut ticker| ticker.stop());
        if closed || stopped {
            debug!(closed, stopped, "Released session resources");
        }
        closed || stopped
    }
}

impl<S: EventSource> Drop for SessionController<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<S: EventSource> std::fmt::Debug for SessionController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .field("ticker_handle", &self.ticker_handle)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
