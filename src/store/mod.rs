// src/store/mod.rs
//! Persistence: bulk upserts keyed on `url`, one call per batch.

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::ingest::types::{EventRecord, SourceRecord};

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Logical tables on the data endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    SourcesRaw,
    Events,
    FunctionLogs,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::SourcesRaw => "sources_raw",
            Table::Events => "al_tr_events",
            Table::FunctionLogs => "function_logs",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All-or-nothing batch upserts. Later rows with the same `url` overwrite
/// earlier ones.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_sources(&self, rows: &[SourceRecord]) -> Result<(), PersistenceError>;
    async fn upsert_events(&self, rows: &[EventRecord]) -> Result<(), PersistenceError>;
}
