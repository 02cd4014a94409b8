//! Feed ingestion service: HTTP entrypoint.
//! `POST /fetch-feeds` runs one ingestion pass; an external scheduler is
//! expected to call it periodically.

use alterna_monitor::api::{self, AppState};
use alterna_monitor::metrics::Metrics;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    alterna_monitor::init_tracing();

    let metrics = Metrics::init()?;
    let router = api::create_router(AppState::from_env()).merge(metrics.router());

    Ok(router.into())
}
