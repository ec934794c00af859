//! Integration tests for generation sessions over a real SSE connection.
//!
//! These tests drive `SessionController` with the production
//! `SseEventSource` against an in-process axum backend.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use diro_session::session_state::{CANCELLED_MESSAGE, TRANSPORT_FAILURE_MESSAGE};
use diro_session::sse::SseDecoder;
use diro_session::{
    ApiClient, GenerationForm, SessionController, SessionStatus, SessionUpdate, SseEventSource,
};
use serde_json::json;
use tokio::time::timeout;

use common::{find_available_port, spawn_backend, MockBackend, StreamScript};

fn senior_question_paper() -> GenerationForm {
    let mut form = GenerationForm::new();
    form.set_grade("Grade 11")
        .set_material_type("Question paper")
        .set_max_marks(Some(50))
        .set_stream(Some("Science".to_string()))
        .set_chapter("Thermodynamics")
        .set_difficulty("medium");
    form
}

fn junior_worksheet() -> GenerationForm {
    let mut form = GenerationForm::new();
    form.set_grade("Grade 5")
        .set_chapter("Fractions")
        .set_material_type("Worksheet")
        .set_difficulty("easy");
    form
}

fn controller_for(base_url: &str) -> SessionController<SseEventSource> {
    let api = ApiClient::new(base_url, Duration::from_secs(5));
    SessionController::new(api.event_source())
}

/// Drives the session to the end, failing the test if it hangs.
async fn run_to_end(controller: &mut SessionController<SseEventSource>) -> Vec<SessionUpdate> {
    timeout(Duration::from_secs(10), async {
        let mut updates = Vec::new();
        while let Some(update) = controller.next_update().await {
            updates.push(update);
        }
        updates
    })
    .await
    .expect("Timeout waiting for session to finish")
}

// ============================================================================
// Outcome Tests
// ============================================================================

/// Tests the full success path: progress, output, and the request query.
#[tokio::test]
async fn test_senior_question_paper_succeeds() {
    let backend = MockBackend::new(StreamScript::held(&[
        json!({ "progress": 30 }),
        json!({ "progress": 70 }),
        json!({ "output": "Q1. Define entropy." }),
    ]));
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&senior_question_paper()).expect("valid form");
    let updates = run_to_end(&mut controller).await;

    let names: Vec<_> = updates.iter().map(SessionUpdate::event_name).collect();
    assert_eq!(names, vec!["progress", "progress", "succeeded"]);
    assert_eq!(controller.status(), SessionStatus::Succeeded);
    assert_eq!(controller.display_progress(), 100);

    let result = controller.result().expect("result after success");
    assert!(result.starts_with(
        "Generated Question paper (Grade: Grade 11, Stream: Science, Chapter: Thermodynamics, Difficulty: medium, Max Marks: 50)"
    ));
    assert!(result.ends_with("Q1. Define entropy."));

    let query = backend.last_query().await;
    assert_eq!(query.get("grade").map(String::as_str), Some("Grade 11"));
    assert_eq!(query.get("material_type").map(String::as_str), Some("Question paper"));
    assert_eq!(query.get("stream").map(String::as_str), Some("Science"));
    assert_eq!(query.get("max_marks").map(String::as_str), Some("50"));

    // The held-open stream is released once output arrives
    backend.wait_for_closed(1).await;
    assert!(!controller.has_live_subscription());
    assert_eq!(controller.message_index(), None);
}

/// Tests that a junior worksheet sends neither stream nor max_marks.
#[tokio::test]
async fn test_junior_worksheet_query_omits_optional_fields() {
    let backend = MockBackend::new(StreamScript::held(&[json!({ "output": "1) 1/2 + 1/4" })]));
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");
    run_to_end(&mut controller).await;

    let query = backend.last_query().await;
    assert_eq!(query.get("grade").map(String::as_str), Some("Grade 5"));
    assert_eq!(query.get("chapter").map(String::as_str), Some("Fractions"));
    assert_eq!(query.get("difficulty").map(String::as_str), Some("easy"));
    assert!(!query.contains_key("stream"));
    assert!(!query.contains_key("max_marks"));
}

/// Tests that a server-reported error fails the session with its message.
#[tokio::test]
async fn test_server_error_fails_session() {
    let backend = MockBackend::new(StreamScript::held(&[
        json!({ "progress": 15 }),
        json!({ "error": "rate limited" }),
    ]));
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&senior_question_paper()).expect("valid form");
    let updates = run_to_end(&mut controller).await;

    assert!(matches!(updates.last(), Some(SessionUpdate::Failed(_))));
    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(controller.error_message(), Some("rate limited"));
    assert_eq!(controller.display_progress(), 100);
    assert_eq!(controller.result(), None);
    backend.wait_for_closed(1).await;
}

/// Tests that unusable payloads are skipped without ending the session.
#[tokio::test]
async fn test_malformed_payloads_are_skipped() {
    let mut script = StreamScript::held(&[]);
    script.frames = vec![
        "not json".to_string(),
        json!({ "progress": 40 }).to_string(),
        json!([1, 2, 3]).to_string(),
        json!({ "note": "no signal here" }).to_string(),
        json!({ "output": "done" }).to_string(),
    ];
    let backend = MockBackend::new(script);
    let (base_url, _handle) = spawn_backend(backend).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");
    let updates = run_to_end(&mut controller).await;

    let names: Vec<_> = updates.iter().map(SessionUpdate::event_name).collect();
    assert_eq!(names, vec!["progress", "succeeded"]);
    assert_eq!(controller.status(), SessionStatus::Succeeded);
}

/// Tests that named events are ignored, even when their data looks terminal.
#[tokio::test]
async fn test_named_events_do_not_end_session() {
    let mut script = StreamScript::held(&[
        json!({ "progress": 50 }),
        json!({ "output": "Q1. Define entropy." }),
    ]);
    script.named = vec![
        ("heartbeat".to_string(), json!({ "error": "not for the session" }).to_string()),
        ("ping".to_string(), json!({ "output": "pong" }).to_string()),
    ];
    let backend = MockBackend::new(script);
    let (base_url, _handle) = spawn_backend(backend).await;

    let mut controller = controller_for(&base_url);
    controller.start(&senior_question_paper()).expect("valid form");
    let updates = run_to_end(&mut controller).await;

    let names: Vec<_> = updates.iter().map(SessionUpdate::event_name).collect();
    assert_eq!(names, vec!["progress", "succeeded"]);
    assert!(controller.result().expect("result").ends_with("Q1. Define entropy."));
}

// ============================================================================
// Wire Format Tests
// ============================================================================

/// Tests the raw stream framing the controller decodes.
#[tokio::test]
async fn test_stream_wire_format() {
    let mut script = StreamScript::closing(&[json!({ "progress": 20 }), json!({ "output": "x" })]);
    script.named = vec![("heartbeat".to_string(), "{}".to_string())];
    let backend = MockBackend::new(script);
    let (base_url, _handle) = spawn_backend(backend).await;

    let response = reqwest::Client::new()
        .get(format!("{base_url}/api/generate_stream"))
        .query(&[("grade", "Grade 5"), ("chapter", "Fractions")])
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_success());
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "got {content_type}");

    let body = timeout(Duration::from_secs(5), response.text())
        .await
        .expect("Timeout waiting for body")
        .expect("body readable");
    assert!(body.contains("event:"));
    assert!(body.contains("heartbeat"));

    let mut decoder = SseDecoder::new();
    assert_eq!(
        decoder.push(body.as_bytes()),
        vec![r#"{"progress":20}"#.to_string(), r#"{"output":"x"}"#.to_string()]
    );
}

// ============================================================================
// Transport Failure Tests
// ============================================================================

/// Tests that a stream closed before output fails the session.
#[tokio::test]
async fn test_stream_closed_early_fails_session() {
    let backend = MockBackend::new(StreamScript::closing(&[json!({ "progress": 20 })]));
    let (base_url, _handle) = spawn_backend(backend).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");
    run_to_end(&mut controller).await;

    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(controller.error_message(), Some(TRANSPORT_FAILURE_MESSAGE));
    assert_eq!(controller.display_progress(), 100);
    assert!(!controller.is_ticker_running());
}

/// Tests that an unreachable backend fails the session without a result.
#[tokio::test]
async fn test_connection_refused_fails_session() {
    let port = find_available_port();
    let mut controller = controller_for(&format!("http://127.0.0.1:{port}"));
    controller.start(&junior_worksheet()).expect("valid form");

    let updates = run_to_end(&mut controller).await;

    assert_eq!(updates.len(), 1);
    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(controller.display_progress(), 100);
    assert_eq!(controller.result(), None);
    assert!(!controller.has_live_subscription());
}

/// Tests that an HTTP error status on the stream request fails the session.
#[tokio::test]
async fn test_rejected_stream_request_fails_session() {
    let backend = MockBackend::new(StreamScript {
        reject_with: Some(StatusCode::SERVICE_UNAVAILABLE),
        ..StreamScript::default()
    });
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");
    run_to_end(&mut controller).await;

    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(backend.opened(), 0);
    assert_eq!(backend.queries.lock().await.len(), 1);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

/// Tests that cancel closes the live connection and is idempotent.
#[tokio::test]
async fn test_cancel_closes_connection() {
    let backend = MockBackend::new(StreamScript::held(&[json!({ "progress": 10 })]));
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");

    let first = timeout(Duration::from_secs(5), controller.next_update())
        .await
        .expect("Timeout waiting for progress");
    assert!(matches!(first, Some(SessionUpdate::Progress(_))));

    assert!(controller.cancel());
    assert!(!controller.cancel());
    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(controller.error_message(), Some(CANCELLED_MESSAGE));

    backend.wait_for_closed(1).await;
    assert_eq!(backend.opened(), 1);
}

/// Tests that starting again while in flight replaces the first connection.
#[tokio::test]
async fn test_restart_replaces_live_connection() {
    let backend = MockBackend::new(StreamScript::held(&[json!({ "progress": 10 })]));
    let (base_url, _handle) = spawn_backend(backend.clone()).await;

    let mut controller = controller_for(&base_url);
    controller.start(&junior_worksheet()).expect("valid form");
    timeout(Duration::from_secs(5), controller.next_update())
        .await
        .expect("Timeout waiting for progress");

    controller.start(&senior_question_paper()).expect("valid form");
    assert_eq!(controller.status(), SessionStatus::InFlight);
    assert_eq!(controller.progress(), 0.0);

    // The second stream delivers its own progress once connected
    let next = timeout(Duration::from_secs(5), controller.next_update())
        .await
        .expect("Timeout waiting for progress");
    assert!(matches!(next, Some(SessionUpdate::Progress(_))));

    backend.wait_for_closed(1).await;
    assert_eq!(backend.opened(), 2);
    assert_eq!(backend.closed(), 1);

    drop(controller);
    backend.wait_for_closed(2).await;
}
