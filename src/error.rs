// src/error.rs
//! Error taxonomy for one ingestion run.
//!
//! Only [`ConfigError`] is fatal. Everything else is caught at the
//! per-source boundary, logged and recorded into the run summary.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY")]
    MissingCredentials,
    #[error("invalid feed list: {0}")]
    FeedList(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch failed with status {0}")]
    Status(u16),
    #[error("Timeout")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml: unclosed element <{0}>")]
    UnclosedElement(String),
    #[error("xml: document has no root element")]
    NoRoot,
    #[error("embedded data marker not found")]
    MarkerNotFound,
    #[error("embedded data has no closing </script>")]
    UnclosedEmbeddedData,
    #[error("embedded json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("upsert rejected ({status}): {code} {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    #[error("upsert transport: {0}")]
    Transport(String),
}

impl PersistenceError {
    /// PostgREST-style error code, when the data endpoint returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            PersistenceError::Rejected { code, .. } if !code.is_empty() => Some(code),
            _ => None,
        }
    }
}

/// Anything that can make a single source fail before its batches are built.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl SourceError {
    /// Text recorded in the run summary's error list.
    pub fn summary_text(&self) -> String {
        match self {
            SourceError::Fetch(FetchError::Timeout) => "Timeout".to_string(),
            other => other.to_string(),
        }
    }
}
