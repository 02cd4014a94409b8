// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - /fetch-offering-mvp (any method) -> 410
// - /fetch-feeds with missing credentials -> 500, nothing fetched

use async_trait::async_trait;
use http::{Request, StatusCode};
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use alterna_monitor::api::{self, AppState};
use alterna_monitor::error::{ConfigError, FetchError};
use alterna_monitor::ingest::fetch::FeedFetcher;

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl FeedFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Status(599))
    }
}

fn test_router(fetcher: Arc<CountingFetcher>) -> Router {
    api::router(AppState {
        fetcher,
        load_config: Arc::new(|| Err(ConfigError::MissingCredentials)),
    })
}

async fn json_body(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router(Arc::default());
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn retired_endpoint_is_gone_for_every_method() {
    for method in ["GET", "POST", "PUT", "DELETE"] {
        let app = test_router(Arc::default());
        let req = Request::builder()
            .method(method)
            .uri("/fetch-offering-mvp")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::GONE, "{method}");
        let v = json_body(resp).await;
        assert_eq!(v["ok"], false);
        assert_eq!(v["code"], "GONE");
        assert_eq!(v["message"], "This function has been deprecated and removed.");
    }
}

#[tokio::test]
async fn missing_credentials_abort_before_any_fetch() {
    let fetcher = Arc::new(CountingFetcher::default());
    let app = test_router(fetcher.clone());
    let req = Request::builder()
        .method("POST")
        .uri("/fetch-feeds")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v = json_body(resp).await;
    assert_eq!(v["ok"], false);
    assert_eq!(
        v["reason"],
        "Missing SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY"
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}
