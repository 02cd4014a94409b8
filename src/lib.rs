// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod classify;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod runlog;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::{run_once, run_with_config, RunSummary};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Process logging for both binaries. `RUST_LOG` overrides the default
/// filter; `LOG_FORMAT=json` switches to JSON lines. Safe to call when a
/// subscriber is already installed (e.g. by the hosting runtime).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ingest=info,alterna_monitor=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
