//! HTTP routes: the live channel endpoint and health checks.
//!
//! The live channel is not tied to a route: a request carrying WebSocket
//! upgrade headers is upgraded on any path when the channel is enabled. A
//! plain request to the root gets the health JSON.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::channel::serve_channel;
use crate::config::{CorsConfig, ServerConfig};
use crate::hub::BroadcastHub;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out for content change notifications. REST mutation handlers get
    /// it from here and call it after their write commits.
    pub hub: BroadcastHub,
    pub config: Arc<ServerConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new(hub: BroadcastHub, config: ServerConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

/// Build the router with tracing, request ids and CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", get(root))
        .route("/api", get(api_index))
        .route("/api/health", get(api_health))
        .route("/api/status", get(api_status))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let policy = cors.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin.to_str().map(|o| policy.allows(o)).unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

fn upgrade_channel(state: &AppState, upgrade: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let ping_interval = state.config.ping_interval;
    upgrade
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "Live channel upgrade failed");
        })
        .on_upgrade(move |socket| serve_channel(socket, hub, ping_interval))
}

/// Live channel upgrade, or the root health document.
async fn root(State(state): State<AppState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(upgrade) if state.config.ws_enabled => upgrade_channel(&state, upgrade),
        _ => Json(json!({
            "status": "ok",
            "env": state.config.environment,
        }))
        .into_response(),
    }
}

/// Upgrades on unrouted paths; everything else is a 404.
async fn fallback(State(state): State<AppState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(upgrade) if state.config.ws_enabled => upgrade_channel(&state, upgrade),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn api_index() -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "message": "API is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn api_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "api": true }))
}

async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "backend",
        "environment": state.config.environment,
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "liveChannels": state.hub.open_channels(),
    }))
}
