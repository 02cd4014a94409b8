// src/store/memory.rs
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{RecordStore, Table};
use crate::error::PersistenceError;
use crate::ingest::types::{EventRecord, SourceRecord};

/// In-process store with the same url-keyed overwrite semantics as the REST
/// endpoint, including its refusal of a batch that names one url twice.
/// Used by tests and dry runs; either table can be told to reject.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub sources: Mutex<BTreeMap<String, SourceRecord>>,
    pub events: Mutex<BTreeMap<String, EventRecord>>,
    fail_sources: AtomicBool,
    fail_events: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_table(&self, table: Table, fail: bool) {
        match table {
            Table::SourcesRaw => self.fail_sources.store(fail, Ordering::SeqCst),
            Table::Events => self.fail_events.store(fail, Ordering::SeqCst),
            Table::FunctionLogs => {}
        }
    }

    /// Number of upsert calls received (including rejected ones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn source_snapshot(&self) -> BTreeMap<String, SourceRecord> {
        self.sources.lock().unwrap().clone()
    }

    pub fn event_snapshot(&self) -> BTreeMap<String, EventRecord> {
        self.events.lock().unwrap().clone()
    }

    /// Same outcome as an `ON CONFLICT DO UPDATE` touching a row twice.
    fn check_unique<'a>(
        table: Table,
        urls: impl Iterator<Item = &'a str>,
    ) -> Result<(), PersistenceError> {
        let mut seen = HashSet::new();
        for url in urls {
            if !seen.insert(url) {
                return Err(PersistenceError::Rejected {
                    status: 500,
                    code: "21000".into(),
                    message: format!("{table}: batch repeats url {url}"),
                });
            }
        }
        Ok(())
    }

    fn reject(table: Table) -> PersistenceError {
        PersistenceError::Rejected {
            status: 500,
            code: "MEMORY".into(),
            message: format!("{table} rejected by configuration"),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_sources(&self, rows: &[SourceRecord]) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sources.load(Ordering::SeqCst) {
            return Err(Self::reject(Table::SourcesRaw));
        }
        Self::check_unique(Table::SourcesRaw, rows.iter().map(|r| r.url.as_str()))?;
        let mut map = self.sources.lock().unwrap();
        for r in rows {
            map.insert(r.url.clone(), r.clone());
        }
        Ok(())
    }

    async fn upsert_events(&self, rows: &[EventRecord]) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(Self::reject(Table::Events));
        }
        Self::check_unique(Table::Events, rows.iter().map(|r| r.url.as_str()))?;
        let mut map = self.events.lock().unwrap();
        for r in rows {
            map.insert(r.url.clone(), r.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, title: &str) -> SourceRecord {
        SourceRecord {
            source: "PRTIMES".into(),
            url: url.into(),
            title: title.into(),
            content: String::new(),
            published_at: "2025-09-01T00:00:00+00:00".into(),
            author: String::new(),
            fetched_at: "2025-09-01T00:00:00+00:00".into(),
        }
    }

    #[tokio::test]
    async fn later_batches_overwrite_by_url() {
        let store = MemoryStore::new();
        store.upsert_sources(&[row("https://a/1", "old")]).await.unwrap();
        store.upsert_sources(&[row("https://a/1", "new")]).await.unwrap();
        let snap = store.source_snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["https://a/1"].title, "new");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn batch_repeating_a_url_is_rejected_whole() {
        let store = MemoryStore::new();
        let err = store
            .upsert_sources(&[row("https://a/1", "x"), row("https://a/1", "y")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("21000"));
        assert!(store.source_snapshot().is_empty());
    }
}
