//! Test utilities for toro-core
//!
//! A mock extraction service speaking the scanner's HTTP contract: multipart
//! upload with a `file` part, JSON result on success, `{detail}` on failure.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Path the mock scanner is mounted on
pub const SCANNER_PATH: &str = "/api/v1/scanner/";

/// What the mock scanner answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this JSON body
    Json(Value),
    /// 200 with a raw text body (fenced JSON, prose, ...)
    Text(String),
    /// Non-success status with an optional `{detail}` body
    Error { status: u16, detail: Option<String> },
}

impl MockReply {
    /// The Zelle receipt used throughout the tests
    pub fn zelle() -> Self {
        Self::Json(json!({
            "amount": 1250.00,
            "currency": "USD",
            "reference_id": "REF-88772233",
            "platform": "ZELLE",
            "sender_name": "Maria Garcia",
            "raw_text_snippet": "Zelle payment sent"
        }))
    }
}

/// An upload the mock received
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

struct ServerState {
    reply: MockReply,
    requests: AtomicUsize,
    uploads: Mutex<Vec<ReceivedUpload>>,
}

/// Mock extraction server for testing
pub struct MockExtractionServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockExtractionServer {
    /// Start a server answering with the Zelle receipt
    pub async fn start() -> Self {
        Self::start_with(MockReply::zelle()).await
    }

    /// Start a server with a fixed reply on an available port
    pub async fn start_with(reply: MockReply) -> Self {
        let state = Arc::new(ServerState {
            reply,
            requests: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(SCANNER_PATH, post(handle_scan).get(handle_health))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Full scanner endpoint URL
    pub fn scanner_url(&self) -> String {
        format!("http://{}{}", self.addr, SCANNER_PATH)
    }

    /// Number of scan requests received
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Uploads received so far
    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockExtractionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_scan(State(state): State<Arc<ServerState>>, mut multipart: Multipart) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        upload = Some(ReceivedUpload {
            file_name,
            content_type,
            size,
        });
    }

    let Some(upload) = upload else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "Missing file" })),
        )
            .into_response();
    };
    state.uploads.lock().unwrap().push(upload);

    match &state.reply {
        MockReply::Json(body) => Json(body.clone()).into_response(),
        MockReply::Text(body) => body.clone().into_response(),
        MockReply::Error { status, detail } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            match detail {
                Some(detail) => (status, Json(json!({ "detail": detail }))).into_response(),
                None => (status, "Internal Server Error").into_response(),
            }
        }
    }
}
