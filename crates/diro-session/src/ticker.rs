//! Decorative rotating-message ticker.
//!
//! Runs as its own task, independent of generation progress. The controller
//! starts it when a session goes in flight and stops it on every terminal
//! path; the only shared state is the published message index.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{DiroError, Result};

/// Messages shown while a generation is running.
const DEFAULT_MESSAGES: [&str; 10] = [
    "Tip: shorter chapter names usually give more focused material.",
    "Trivia: the word 'syllabus' comes from a misreading in an old Latin manuscript.",
    "Did you know? Worksheets have been used in classrooms since the 19th century.",
    "Tip: question papers balance marks across every section of the chapter.",
    "Trivia: 'school' comes from the Greek 'schole', which meant leisure.",
    "Fun fact: teachers make hundreds of small decisions every school day.",
    "Tip: lesson plans skip the difficulty setting entirely.",
    "Did you know? Retrieval-augmented generation grounds answers in your textbook.",
    "Keep going! Every great lesson starts with a draft.",
    "Tip: senior grades pick a stream so questions match the right syllabus.",
];

/// A fixed, non-empty list of decorative messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatingMessages {
    messages: Vec<String>,
}

impl Default for RotatingMessages {
    fn default() -> Self {
        Self {
            messages: DEFAULT_MESSAGES.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

impl RotatingMessages {
    /// Creates a message list.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::EmptyMessageList` if `messages` is empty.
    pub fn new(messages: Vec<String>) -> Result<Self> {
        if messages.is_empty() {
            return Err(DiroError::EmptyMessageList);
        }
        Ok(Self { messages })
    }

    /// Number of messages; always at least 1.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message at `index`, wrapping around the list.
    #[must_use]
    pub fn get(&self, index: usize) -> &str {
        &self.messages[index % self.messages.len()]
    }

    /// Picks an unpredictable starting index.
    #[must_use]
    pub fn random_index(&self) -> usize {
        rand::rng().random_range(0..self.messages.len())
    }
}

/// Spawns tickers that advance a message index at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct DecorativeTicker {
    period: Duration,
}

impl DecorativeTicker {
    /// Creates a ticker with the given rotation period.
    ///
    /// A zero period is raised to one millisecond.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// The rotation period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Starts rotating through `len` messages from `start`.
    ///
    /// The first advance happens one full period after starting. Must be
    /// called from within a tokio runtime.
    #[must_use]
    pub fn start(&self, len: usize, start: usize) -> TickerHandle {
        let len = len.max(1);
        let (tx, rx) = watch::channel(start % len);
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tx.send_modify(|index| *index = (*index + 1) % len);
                tracing::trace!(index = *tx.borrow(), "Rotated decorative message");
            }
        });

        TickerHandle {
            index: rx,
            task: Some(task),
        }
    }
}

/// Owning handle to a running ticker.
///
/// Dropping the handle stops the ticker.
#[derive(Debug)]
pub struct TickerHandle {
    index: watch::Receiver<usize>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// The current message index.
    #[must_use]
    pub fn index(&self) -> usize {
        *self.index.borrow()
    }

    /// A receiver that observes index changes.
    ///
    /// The receiver reports the channel closed once the ticker stops.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.index.clone()
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stops the ticker. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
