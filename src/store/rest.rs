// src/store/rest.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{RecordStore, Table};
use crate::error::PersistenceError;
use crate::ingest::config::StoreCredentials;
use crate::ingest::types::{EventRecord, SourceRecord};

/// PostgREST-style endpoint: `POST {base}/rest/v1/{table}?on_conflict=url`
/// with `Prefer: resolution=merge-duplicates`.
#[derive(Clone)]
pub struct RestStore {
    creds: StoreCredentials,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RestStore {
    pub fn new(creds: StoreCredentials) -> Self {
        Self {
            creds,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn table_url(&self, table: Table) -> String {
        format!(
            "{}/rest/v1/{}",
            self.creds.base_url.trim_end_matches('/'),
            table.as_str()
        )
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("apikey", &self.creds.service_key)
            .bearer_auth(&self.creds.service_key)
            .timeout(self.timeout)
    }

    /// Bulk upsert; one HTTP call for the whole batch.
    pub async fn upsert<T: Serialize + Sync>(
        &self,
        table: Table,
        rows: &[T],
    ) -> Result<(), PersistenceError> {
        let req = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", "url")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);

        let rsp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = rsp.text().await.unwrap_or_default();
        let parsed: RestErrorBody = serde_json::from_str(&body).unwrap_or_default();
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            code: parsed.code.unwrap_or_default(),
            message: parsed.message.unwrap_or(body),
        })
    }

    /// Plain insert (log rows have no natural key).
    pub async fn insert<T: Serialize + Sync>(
        &self,
        table: Table,
        row: &T,
    ) -> Result<(), PersistenceError> {
        let req = self.client.post(self.table_url(table)).json(row);
        let rsp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        let status = rsp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PersistenceError::Rejected {
                status: status.as_u16(),
                code: String::new(),
                message: rsp.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn upsert_sources(&self, rows: &[SourceRecord]) -> Result<(), PersistenceError> {
        self.upsert(Table::SourcesRaw, rows).await
    }

    async fn upsert_events(&self, rows: &[EventRecord]) -> Result<(), PersistenceError> {
        self.upsert(Table::Events, rows).await
    }
}
