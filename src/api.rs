use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::ConfigError;
use crate::ingest::config::IngestConfig;
use crate::ingest::fetch::{FeedFetcher, HttpFetcher};
use crate::ingest::run_with_config;
use crate::runlog::{LocalLogger, RunLogger};

pub type ConfigLoader = Arc<dyn Fn() -> Result<IngestConfig, ConfigError> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn FeedFetcher>,
    pub load_config: ConfigLoader,
}

impl AppState {
    /// HTTP fetcher from env; run config is re-read from env on every trigger.
    pub fn from_env() -> Self {
        Self {
            fetcher: Arc::new(HttpFetcher::from_env()),
            load_config: Arc::new(IngestConfig::from_env),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/fetch-feeds", get(fetch_feeds).post(fetch_feeds))
        .route("/fetch-offering-mvp", any(gone))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Back-compat alias used by binaries/tests.
pub fn router(state: AppState) -> Router {
    create_router(state)
}

async fn fetch_feeds(State(state): State<AppState>) -> Response {
    LocalLogger.info("Starting function execution", json!({})).await;

    // Config is checked before anything leaves the process.
    let cfg = match (state.load_config)() {
        Ok(c) => c,
        Err(e) => {
            LocalLogger.error(&e.to_string(), json!({})).await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "reason": e.to_string() })),
            )
                .into_response();
        }
    };

    let summary = run_with_config(&cfg, state.fetcher.as_ref()).await;
    match serde_json::to_string_pretty(&summary) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Retired endpoint: permanently gone, callers must not retry.
async fn gone() -> Response {
    (
        StatusCode::GONE,
        Json(json!({
            "ok": false,
            "code": "GONE",
            "message": "This function has been deprecated and removed.",
        })),
    )
        .into_response()
}
