// src/ingest/fetch.rs
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str = "alterna-lite-monitor/1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const ENV_USER_AGENT: &str = "INGEST_USER_AGENT";
const ENV_TIMEOUT_SECS: &str = "INGEST_FETCH_TIMEOUT_SECS";

/// Retrieves a raw document (XML or HTML) from a remote source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Plain HTTP GET with a fixed user agent and a hard timeout. No retries:
/// a failed fetch is reported and the run moves on to the next source.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// `INGEST_USER_AGENT` / `INGEST_FETCH_TIMEOUT_SECS`, with defaults.
    pub fn from_env() -> Self {
        let user_agent =
            std::env::var(ENV_USER_AGENT).unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
        let secs = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(user_agent, Duration::from_secs(secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request = async {
            let resp = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            resp.text()
                .await
                .map_err(|e| match FetchError::from(e) {
                    FetchError::Transport(m) => FetchError::Body(m),
                    other => other,
                })
        };

        // The whole exchange (headers + body) shares one deadline; dropping
        // the future on expiry cancels the request.
        match tokio::time::timeout(self.timeout, request).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(
                    url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "fetch timed out"
                );
                Err(FetchError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_monitor_agent_and_15s() {
        let f = HttpFetcher::default();
        assert_eq!(f.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(f.timeout(), Duration::from_secs(15));
    }
}
