use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    session::PollSession,
    types::{Endpoint, SessionState},
};

#[derive(Clone)]
pub struct AppState {
    session: Arc<PollSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    pub state: SessionState,
    pub endpoint: Option<Endpoint>,
    pub cursor: u64,
}

#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    #[serde(default)]
    pub host: Option<String>,
    pub port: u16,
}

/// Control API for a session. Any origin may call it; browser front-ends run elsewhere.
pub fn router(session: Arc<PollSession>) -> Router {
    let state = AppState { session };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    let api = Router::new()
        .route("/status", get(get_status))
        .route("/start", post(post_start))
        .route("/stop", post(post_stop))
        .route("/scan", post(post_scan))
        .route("/endpoint", get(get_endpoint).put(put_endpoint))
        .route("/log", get(get_log))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, session: Arc<PollSession>) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    serve(listener, session).await
}

pub async fn serve(listener: TcpListener, session: Arc<PollSession>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "control API listening");
    axum::serve(listener, router(session)).await?;
    Ok(())
}

fn status_body(session: &PollSession) -> StatusBody {
    StatusBody {
        state: session.status(),
        endpoint: session.endpoint(),
        cursor: session.cursor(),
    }
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(status_body(&app.session)))
}

async fn post_start(State(app): State<AppState>) -> impl IntoResponse {
    app.session.start().await;
    (StatusCode::ACCEPTED, Json(status_body(&app.session)))
}

async fn post_stop(State(app): State<AppState>) -> impl IntoResponse {
    app.session.stop().await;
    (StatusCode::OK, Json(status_body(&app.session)))
}

async fn post_scan(State(app): State<AppState>) -> impl IntoResponse {
    match app.session.scan().await {
        Some(ep) => (StatusCode::OK, Json(ep)).into_response(),
        None => (StatusCode::NOT_FOUND, "no bridge found").into_response(),
    }
}

async fn get_endpoint(State(app): State<AppState>) -> impl IntoResponse {
    match app.session.endpoint() {
        Some(ep) => (StatusCode::OK, Json(ep)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn put_endpoint(
    State(app): State<AppState>,
    Json(req): Json<EndpointRequest>,
) -> impl IntoResponse {
    if req.port == 0 {
        return (StatusCode::BAD_REQUEST, "port out of range: 0").into_response();
    }
    let host = req
        .host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| app.session.config().host.clone());
    let ep = Endpoint::new(host, req.port);
    app.session.set_endpoint(ep.clone());
    (StatusCode::OK, Json(ep)).into_response()
}

async fn get_log(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.session.status_log()))
}
