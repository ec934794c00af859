//! DIRO Generation Session
//!
//! Runs one material-generation request at a time over a server-sent-events
//! stream, rotates decorative messages while it waits, and exports the
//! finished text through the backend API.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod params;
pub mod session_state;
pub mod source;
pub mod sse;
pub mod ticker;
pub mod updates;

pub use api::{ApiClient, ExportFormat};
pub use config::{Config, BACKEND_URL_ENV};
pub use controller::{SessionController, DEFAULT_MESSAGE_INTERVAL};
pub use error::{DiroError, Result};
pub use event::{decode_event, PushedPayload, SessionEvent};
pub use params::{
    grade_number, is_lesson_plan, is_question_paper, needs_stream, GenerationForm,
    GenerationParams, GenerationRequest, DEFAULT_DIFFICULTY, DIFFICULTIES, GRADES, MATERIAL_TYPES,
    STREAMS,
};
pub use session_state::{SessionState, SessionStatus};
pub use source::{EventSource, SseEventSource, Subscription};
pub use ticker::{DecorativeTicker, RotatingMessages, TickerHandle};
pub use updates::{SessionUpdate, UpdateBroadcaster};
