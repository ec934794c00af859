//! In-process mock of the DIRO backend shared by the integration tests.
//!
//! Serves the generation stream, export, download and health endpoints on an
//! ephemeral port. Each test configures what the stream sends and inspects
//! what the client asked for.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// What the mock generation stream does for every subscription.
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    /// `data` payloads sent in order.
    pub frames: Vec<String>,
    /// Keep the stream open after the last frame instead of closing it.
    pub hold_open: bool,
    /// Reject the request with this status instead of streaming.
    pub reject_with: Option<StatusCode>,
    /// Named `(event, data)` pairs sent before the frames.
    pub named: Vec<(String, String)>,
}

impl StreamScript {
    /// Sends `frames` and then keeps the connection open.
    pub fn held(frames: &[Value]) -> Self {
        Self {
            frames: frames.iter().map(Value::to_string).collect(),
            hold_open: true,
            reject_with: None,
            named: Vec::new(),
        }
    }

    /// Sends `frames` and then closes the connection.
    pub fn closing(frames: &[Value]) -> Self {
        Self {
            hold_open: false,
            ..Self::held(frames)
        }
    }
}

/// Shared state of the mock backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub script: Arc<Mutex<StreamScript>>,
    pub queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub exports: Arc<Mutex<Vec<Value>>>,
    pub opened_streams: Arc<AtomicUsize>,
    pub closed_streams: Arc<AtomicUsize>,
    pub health_status: Arc<Mutex<String>>,
    pub generations: Arc<Mutex<Vec<Value>>>,
    pub catalogues_down: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new(script: StreamScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            health_status: Arc::new(Mutex::new("ok".to_string())),
            ..Self::default()
        }
    }

    pub fn closed(&self) -> usize {
        self.closed_streams.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }

    /// Waits until the server has seen `expected` stream disconnects.
    pub async fn wait_for_closed(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.closed() < expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "server saw {} closed streams, expected {expected}",
                self.closed()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn last_query(&self) -> HashMap<String, String> {
        self.queries
            .lock()
            .await
            .last()
            .cloned()
            .expect("no generation request received")
    }
}

/// Increments a counter when the response stream is dropped.
struct CloseGuard(Arc<AtomicUsize>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn generate_stream(
    State(backend): State<MockBackend>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    backend.queries.lock().await.push(query);
    let script = backend.script.lock().await.clone();

    if let Some(status) = script.reject_with {
        return (status, "generation unavailable").into_response();
    }

    backend.opened_streams.fetch_add(1, Ordering::SeqCst);
    let guard = CloseGuard(Arc::clone(&backend.closed_streams));

    let named = script
        .named
        .into_iter()
        .map(|(name, data)| Event::default().event(name).data(data));
    let frames = stream::iter(named.chain(
        script.frames.into_iter().map(|frame| Event::default().data(frame)),
    ));
    let events: BoxStream<'static, Event> = if script.hold_open {
        frames.chain(stream::pending()).boxed()
    } else {
        frames.boxed()
    };
    let events = events.map(move |event| {
        let _held = &guard;
        Ok::<_, Infallible>(event)
    });

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_millis(20)))
        .into_response()
}

async fn export(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    backend.exports.lock().await.push(body.clone());

    let Some(filetype) = body["filetype"].as_str() else {
        return (StatusCode::BAD_REQUEST, "missing filetype").into_response();
    };
    if body["text"].as_str().map_or(true, str::is_empty) {
        return (StatusCode::BAD_REQUEST, "nothing to export").into_response();
    }
    Json(json!({ "file_path": format!("exports/material.{filetype}") })).into_response()
}

async fn download(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("file_path") {
        Some(path) if path.starts_with("exports/") => {
            format!("document:{path}").into_response()
        }
        _ => (StatusCode::NOT_FOUND, "no such file").into_response(),
    }
}

async fn generate(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    backend.generations.lock().await.push(body.clone());

    let chapter = body["chapter"].as_str().unwrap_or_default();
    if chapter.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "chapter is required").into_response();
    }
    let material_type = body["material_type"].as_str().unwrap_or_default();
    Json(json!({ "output": format!("{material_type} on {chapter}") })).into_response()
}

fn catalogue(backend: &MockBackend, items: &[&str]) -> Response {
    if backend.catalogues_down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "catalogue unavailable").into_response();
    }
    Json(json!(items)).into_response()
}

async fn grades(State(backend): State<MockBackend>) -> Response {
    catalogue(&backend, &["Grade 9", "Grade 10", "Grade 11", "Grade 12"])
}

async fn material_types(State(backend): State<MockBackend>) -> Response {
    catalogue(&backend, &["Question paper", "Worksheet"])
}

async fn difficulty_levels(State(backend): State<MockBackend>) -> Response {
    catalogue(&backend, &["easy", "medium", "difficult"])
}

async fn health(State(backend): State<MockBackend>) -> Json<Value> {
    let status = backend.health_status.lock().await.clone();
    Json(json!({ "status": status }))
}

/// Helper to find an available port for testing.
pub fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the mock backend and returns its base URL.
pub async fn spawn_backend(backend: MockBackend) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = Router::new()
        .route("/api/generate_stream", get(generate_stream))
        .route("/api/generate", post(generate))
        .route("/api/grades", get(grades))
        .route("/api/material_types", get(material_types))
        .route("/api/difficulty_levels", get(difficulty_levels))
        .route("/api/export", post(export))
        .route("/api/download", get(download))
        .route("/api/health", get(health))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    (format!("http://{addr}"), handle)
}
