//! Loopback HTTP stand-ins for the device and the sink.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct MockDevice {
    pub(crate) url: String,
    requests: Arc<AtomicU32>,
}

impl MockDevice {
    pub(crate) fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct DeviceState {
    requests: Arc<AtomicU32>,
    failures: u32,
    body: &'static str,
}

async fn details(State(state): State<DeviceState>) -> Response {
    let request = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    if request <= state.failures {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    (StatusCode::OK, state.body).into_response()
}

/// Answers `GET /details.xml` with 503 for the first `failures` requests, then `body`.
pub(crate) async fn spawn_device(failures: u32, body: &'static str) -> MockDevice {
    let requests = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route("/details.xml", get(details))
        .with_state(DeviceState {
            requests: requests.clone(),
            failures,
            body,
        });
    let base = serve(app).await;
    MockDevice {
        url: format!("{base}/details.xml"),
        requests,
    }
}

#[derive(Clone)]
pub(crate) struct MockSink {
    pub(crate) url: String,
    requests: Arc<AtomicU32>,
    accepted: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockSink {
    pub(crate) fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Bodies of the POSTs answered with 200, in arrival order.
    pub(crate) fn accepted(&self) -> Vec<serde_json::Value> {
        self.accepted.lock().unwrap().clone()
    }

    /// The `points` rows of every accepted POST.
    pub(crate) fn accepted_rows(&self) -> Vec<Vec<serde_json::Value>> {
        self.accepted()
            .iter()
            .map(|body| body[0]["points"].as_array().cloned().unwrap_or_default())
            .collect()
    }
}

#[derive(Clone)]
struct SinkState {
    requests: Arc<AtomicU32>,
    failures: u32,
    accepted: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn write_series(State(state): State<SinkState>, body: Bytes) -> StatusCode {
    let request = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    if request <= state.failures {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => {
            state.accepted.lock().unwrap().push(value);
            StatusCode::OK
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

/// Answers `POST /db/env/series` with 500 for the first `failures` requests, then 200.
pub(crate) async fn spawn_sink(failures: u32) -> MockSink {
    let requests = Arc::new(AtomicU32::new(0));
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/db/env/series", post(write_series))
        .with_state(SinkState {
            requests: requests.clone(),
            failures,
            accepted: accepted.clone(),
        });
    let base = serve(app).await;
    MockSink {
        url: format!("{base}/db/env/series"),
        requests,
        accepted,
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

/// Polls `check` until it holds or `timeout` elapses.
pub(crate) async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(timeout, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
