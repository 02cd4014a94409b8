//! One ingestion pass for cron-style schedulers: prints the JSON run summary,
//! exits 1 when required configuration is missing.

use alterna_monitor::ingest::config::IngestConfig;
use alterna_monitor::ingest::fetch::HttpFetcher;
use alterna_monitor::run_with_config;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    alterna_monitor::init_tracing();

    let cfg = match IngestConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            println!("{}", json!({ "ok": false, "reason": e.to_string() }));
            std::process::exit(1);
        }
    };

    let fetcher = HttpFetcher::from_env();
    let summary = run_with_config(&cfg, &fetcher).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
