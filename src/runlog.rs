// src/runlog.rs
//! Run log: structured progress/failure lines for one ingestion run.
//!
//! One capability, interchangeable sinks picked once per run:
//! - [`RemoteLogger`] inserts rows into the `function_logs` table,
//! - [`LocalLogger`] writes through `tracing`,
//! - [`CaptureLogger`] keeps lines in memory (tests, dry runs).
//!
//! Logging never fails the caller: a remote sink that is down degrades to
//! local output for that line.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

use crate::ingest::config::{IngestConfig, LogSinkChoice};
use crate::store::{RestStore, Table};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
    pub details: Value,
}

#[async_trait]
pub trait RunLogger: Send + Sync {
    async fn log(&self, level: LogLevel, message: &str, details: Value);

    async fn info(&self, message: &str, details: Value) {
        self.log(LogLevel::Info, message, details).await
    }

    async fn warn(&self, message: &str, details: Value) {
        self.log(LogLevel::Warn, message, details).await
    }

    async fn error(&self, message: &str, details: Value) {
        self.log(LogLevel::Error, message, details).await
    }
}

fn emit_local(level: LogLevel, message: &str, details: &Value) {
    match level {
        LogLevel::Info => tracing::info!(target: "ingest", %details, "{message}"),
        LogLevel::Warn => tracing::warn!(target: "ingest", %details, "{message}"),
        LogLevel::Error => tracing::error!(target: "ingest", %details, "{message}"),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLogger;

#[async_trait]
impl RunLogger for LocalLogger {
    async fn log(&self, level: LogLevel, message: &str, details: Value) {
        emit_local(level, message, &details);
    }
}

pub struct RemoteLogger {
    store: RestStore,
}

impl RemoteLogger {
    pub fn new(store: RestStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RunLogger for RemoteLogger {
    async fn log(&self, level: LogLevel, message: &str, details: Value) {
        let line = LogLine {
            level,
            message: message.to_string(),
            details,
        };
        if let Err(e) = self.store.insert(Table::FunctionLogs, &line).await {
            tracing::error!(error = %e, "Failed to log to DB");
            emit_local(line.level, &line.message, &line.details);
        }
    }
}

/// Keeps every line; handy for asserting on what a run reported.
#[derive(Debug, Default)]
pub struct CaptureLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.message).collect()
    }
}

#[async_trait]
impl RunLogger for CaptureLogger {
    async fn log(&self, level: LogLevel, message: &str, details: Value) {
        self.lines.lock().unwrap().push(LogLine {
            level,
            message: message.to_string(),
            details,
        });
    }
}

/// Pick the sink for a run from configuration.
pub fn select_logger(cfg: &IngestConfig) -> Box<dyn RunLogger> {
    match cfg.log_sink {
        LogSinkChoice::Remote => Box::new(RemoteLogger::new(RestStore::new(cfg.store.clone()))),
        LogSinkChoice::Local => Box::new(LocalLogger),
    }
}
