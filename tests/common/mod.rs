#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bridge_poll::types::Endpoint;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Health and pull both answer JSON.
    Healthy,
    /// Health answers 503; pulls are never expected.
    Unhealthy,
    /// Health is fine but pulls answer HTML.
    NonJson,
}

#[derive(Clone)]
struct BridgeState {
    mode: Mode,
    hold_when_empty: bool,
    batches: Arc<Mutex<VecDeque<Value>>>,
    seen: Arc<Mutex<Vec<(u64, String)>>>,
}

#[derive(Debug, Deserialize)]
struct PullQuery {
    since: u64,
    target: String,
}

/// A bridge stand-in on an ephemeral localhost port.
pub struct FakeBridge {
    pub endpoint: Endpoint,
    seen: Arc<Mutex<Vec<(u64, String)>>>,
}

impl FakeBridge {
    /// `(since, target)` of every pull received, in order.
    pub fn pulls(&self) -> Vec<(u64, String)> {
        self.seen.lock().unwrap().clone()
    }
}

/// Spawn a bridge that serves `batches` one per pull. Once they run out it either
/// holds the request open (long-poll) or answers an empty batch.
pub async fn spawn_bridge(mode: Mode, batches: Vec<Value>, hold_when_empty: bool) -> FakeBridge {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = BridgeState {
        mode,
        hold_when_empty,
        batches: Arc::new(Mutex::new(batches.into_iter().collect())),
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/health", get(health))
        .route("/pull", get(pull))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeBridge {
        endpoint: Endpoint::localhost(port),
        seen,
    }
}

/// A localhost port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn health(State(s): State<BridgeState>) -> impl IntoResponse {
    match s.mode {
        Mode::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "down").into_response(),
        _ => Json(json!({ "ok": true })).into_response(),
    }
}

async fn pull(State(s): State<BridgeState>, Query(q): Query<PullQuery>) -> impl IntoResponse {
    s.seen.lock().unwrap().push((q.since, q.target));
    if s.mode == Mode::NonJson {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            "<html>bridge</html>",
        )
            .into_response();
    }
    let next = s.batches.lock().unwrap().pop_front();
    match next {
        Some(body) => Json(body).into_response(),
        None => {
            if s.hold_when_empty {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Json(json!({ "events": [] })).into_response()
        }
    }
}
