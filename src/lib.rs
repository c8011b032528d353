pub mod blob;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::engine::cache::ResponseCache;
use crate::engine::matcher::EndpointIndex;
use crate::engine::quota::RateLimiter;
use crate::notify::LimitNotifier;
use crate::state::{AppState, SharedState};
use crate::store::DocumentStore;

pub fn build_state(
    config: Config,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn ResponseCache>,
    blob: Arc<dyn BlobStore>,
    notifier: Arc<dyn LimitNotifier>,
) -> SharedState {
    let index = EndpointIndex::new(store.clone(), Duration::from_secs(config.index_ttl_secs));

    Arc::new(AppState {
        config,
        store,
        cache,
        blob,
        notifier,
        index,
        rate_limiter: RateLimiter::new(),
    })
}

pub fn build_app(state: SharedState) -> Router {
    let body_limit = state.config.max_body_size;

    Router::new()
        .merge(routes::serve_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Last-resort guard: a panicking handler still answers with the standard
/// error envelope instead of a dropped connection.
fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
