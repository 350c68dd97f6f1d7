//! Read-only HTTP surface: `GET /{handle}` as plain text or JSON.

pub mod ratelimit;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use curltree_core::config::ServerConfig;
use curltree_core::render::{render_json, render_plain_text};
use curltree_storage::ProfileStore;
use ratelimit::{client_key, RateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ProfileStore>,
    limiter: Arc<RateLimiter>,
    public_host: Arc<str>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn ProfileStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            public_host: Arc::from(config.public_host.as_str()),
            request_timeout: Duration::from_secs(config.read_timeout_secs),
        }
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }
}

pub fn router(state: AppState) -> Router {
    let profiles = Router::new()
        .route("/", get(missing_handle))
        .route("/:handle", get(show_profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(profiles)
        .layer(middleware::from_fn_with_state(state.clone(), enforce_timeout))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// JSON when asked for explicitly or when the caller is not curl.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let value_of = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    };
    value_of(header::ACCEPT).contains(JSON_CONTENT_TYPE)
        || !value_of(header::USER_AGENT).contains("curl")
}

async fn missing_handle() -> Response {
    (StatusCode::BAD_REQUEST, "Handle is required").into_response()
}

async fn show_profile(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Response {
    let handle = handle.trim().to_string();
    if handle.is_empty() {
        return missing_handle().await;
    }

    let store = Arc::clone(&state.store);
    let lookup_handle = handle.clone();
    let lookup = tokio::task::spawn_blocking(move || store.find_by_handle(&lookup_handle)).await;
    let profile = match lookup {
        Ok(Ok(Some(profile))) => profile,
        Ok(Ok(None)) => return (StatusCode::NOT_FOUND, "Profile not found").into_response(),
        Ok(Err(err)) => {
            error!(event = "profile_lookup_failed", handle = %handle, error = %err);
            return internal_error();
        }
        Err(err) => {
            error!(event = "profile_lookup_panicked", handle = %handle, error = %err);
            return internal_error();
        }
    };

    let public = profile.to_public();
    if wants_json(&headers) {
        match render_json(&public) {
            Ok(body) => ([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response(),
            Err(err) => {
                error!(event = "profile_render_failed", handle = %handle, error = %err);
                internal_error()
            }
        }
    } else {
        let body = render_plain_text(&public, &state.public_host);
        ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

async fn throttle(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let client = client_key(request.headers(), peer);
    if !state.limiter.check(&client) {
        warn!(event = "rate_limited", client = %client, path = %request.uri().path());
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }
    next.run(request).await
}

async fn enforce_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status >= 400 {
        warn!(event = "http_request", method = %method, path = %path, status, latency_ms);
    } else {
        info!(event = "http_request", method = %method, path = %path, status, latency_ms);
    }
    response
}
