// src/ingest/mod.rs
//! One ingestion run: partner site first, then every configured feed in
//! order, strictly one source at a time.
//!
//! The [`RunSummary`] is threaded through each stage by value and returned
//! at the end; no source can stop the ones after it.

pub mod config;
pub mod fetch;
pub mod parse;
pub mod providers;
pub mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::classify::{classify, mentions_any};
use crate::error::{FetchError, ParseError, PersistenceError, SourceError};
use crate::ingest::config::IngestConfig;
use crate::ingest::fetch::FeedFetcher;
use crate::ingest::parse::{parse_feed, sample};
use crate::ingest::providers::alterna_site::{self, SiteData, SITE_NAME};
use crate::ingest::types::{EventRecord, FeedSource, RawItem, SourceRecord};
use crate::runlog::{select_logger, LogLevel, RunLogger};
use crate::store::{RecordStore, RestStore, Table};

const PARSE_SAMPLE_CHARS: usize = 200;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!("ingest_items_total", "Items parsed from generic feeds.");
        describe_counter!(
            "ingest_filtered_total",
            "Items dropped for missing link or organization keywords."
        );
        describe_counter!("ingest_rows_ok_total", "Rows accepted by upserts.");
        describe_counter!("ingest_rows_failed_total", "Rows in rejected upsert batches.");
        describe_counter!(
            "ingest_source_errors_total",
            "Sources skipped on fetch/parse errors."
        );
        describe_histogram!("ingest_fetch_ms", "Fetch time per source in milliseconds.");
    });
}

/// Normalize feed content: decode entities, strip tags, collapse whitespace,
/// cap at `max_chars`.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Feed timestamp → RFC 3339 UTC. Accepts RFC 3339, RFC 2822 and bare
/// `YYYY-MM-DD[ HH:MM[:SS]]` (read as UTC); anything else becomes `now`.
pub fn normalize_timestamp(raw: &str, now: DateTime<Utc>) -> String {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc).to_rfc3339();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc).to_rfc3339();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return naive.and_utc().to_rfc3339();
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return naive.and_utc().to_rfc3339();
    }
    now.to_rfc3339()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEntry {
    pub feed: String,
    pub error: String,
}

/// Counters and per-source errors for one run; also the job's response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub ok_sources: usize,
    pub ng_sources: usize,
    pub ok_events: usize,
    pub ng_events: usize,
    pub errors: Vec<ErrorEntry>,
}

impl RunSummary {
    pub fn record_batch(mut self, table: Table, rows: usize, ok: bool) -> Self {
        let slot = match (table, ok) {
            (Table::SourcesRaw, true) => &mut self.ok_sources,
            (Table::SourcesRaw, false) => &mut self.ng_sources,
            (Table::Events, true) => &mut self.ok_events,
            (Table::Events, false) => &mut self.ng_events,
            (Table::FunctionLogs, _) => return self,
        };
        *slot += rows;
        self
    }

    pub fn push_error(mut self, feed: impl Into<String>, error: impl Into<String>) -> Self {
        self.errors.push(ErrorEntry {
            feed: feed.into(),
            error: error.into(),
        });
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// One row per url, at the position the url first appeared; the last
/// occurrence's contents win. A single upsert call must not touch the same
/// key twice.
pub fn dedup_by_url<T>(rows: Vec<T>, url: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<T> = Vec::with_capacity(rows.len());
    for row in rows {
        let known = seen.get(url(&row)).copied();
        match known {
            Some(i) => out[i] = row,
            None => {
                seen.insert(url(&row).to_string(), out.len());
                out.push(row);
            }
        }
    }
    out
}

/// Rows built from one feed's items, ready for the two upserts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedBatch {
    pub sources: Vec<SourceRecord>,
    pub events: Vec<EventRecord>,
    /// Titles of items dropped for having no usable link.
    pub unlinked: Vec<String>,
    /// Items dropped by the organization keyword filter.
    pub off_topic: usize,
}

/// Link check, keyword filter and classification for one feed's items.
/// Items without a link never reach the classifier.
pub fn prepare_batch(
    source: &str,
    items: Vec<RawItem>,
    cfg: &IngestConfig,
    now: DateTime<Utc>,
) -> PreparedBatch {
    let fetched_at = now.to_rfc3339();
    let mut batch = PreparedBatch::default();

    for it in items {
        let url = it.link.trim().to_string();
        if url.is_empty() {
            batch.unlinked.push(it.title);
            continue;
        }
        let content = normalize_text(&it.content, cfg.content_max_chars);
        let text = format!("{} {}", it.title, content);
        if !mentions_any(&text, &cfg.keywords) {
            batch.off_topic += 1;
            continue;
        }

        let published_at = normalize_timestamp(&it.published, now);
        let fact = classify(&text);

        batch.events.push(EventRecord {
            url: url.clone(),
            event_type: fact.event_type,
            project_name: it.title.clone(),
            asset_type: None,
            location: None,
            min_investment: fact.min_invest,
            expected_yield: fact.expected_yield,
            term_months: None,
            subscription_method: fact.subscription_method,
            sentiment: fact.sentiment,
            published_at: published_at.clone(),
        });
        batch.sources.push(SourceRecord {
            source: source.to_string(),
            url,
            title: it.title,
            content,
            published_at,
            author: it.author,
            fetched_at: fetched_at.clone(),
        });
    }
    batch.sources = dedup_by_url(batch.sources, |r| r.url.as_str());
    batch.events = dedup_by_url(batch.events, |r| r.url.as_str());
    batch
}

/// The sequential run over all sources.
pub struct Pipeline<'a> {
    pub config: &'a IngestConfig,
    pub fetcher: &'a dyn FeedFetcher,
    pub store: &'a dyn RecordStore,
    pub log: &'a dyn RunLogger,
}

impl Pipeline<'_> {
    pub async fn run(&self) -> RunSummary {
        ensure_metrics_described();
        counter!("ingest_runs_total").increment(1);

        let mut summary = self.run_site(RunSummary::default()).await;

        for feed in &self.config.feeds {
            summary = self.run_feed(feed, summary).await;
            // Throttle outbound requests regardless of the feed's outcome.
            tokio::time::sleep(self.config.pause).await;
        }

        let level = if summary.has_errors() {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        let details = serde_json::to_value(&summary).unwrap_or(Value::Null);
        self.log.log(level, "run summary", details).await;
        summary
    }

    async fn fetch_timed(&self, url: &str) -> Result<String, FetchError> {
        let t0 = std::time::Instant::now();
        let res = self.fetcher.fetch(url).await;
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        res
    }

    async fn run_site(&self, summary: RunSummary) -> RunSummary {
        let url = self.config.site_url.as_str();
        self.log
            .info(
                &format!("Fetching {SITE_NAME} for projects"),
                json!({ "url": url }),
            )
            .await;

        let html = match self.fetch_timed(url).await {
            Ok(b) => b,
            Err(e) => return self.source_failed(summary, SITE_NAME, e.into(), json!({})).await,
        };

        let now = Utc::now();
        match alterna_site::parse_site(&html, url, now) {
            Err(e) => self.source_failed(summary, SITE_NAME, e.into(), json!({})).await,
            Ok(SiteData::NoProjects { top_level_keys }) => {
                self.log
                    .warn(
                        "Projects data not found or not an array in embedded data",
                        json!({ "top_level_keys": top_level_keys }),
                    )
                    .await;
                summary
            }
            Ok(SiteData::Projects { total, events }) => {
                self.log
                    .info(
                        &format!("Found {total} projects in embedded data"),
                        json!({ "open": events.len() }),
                    )
                    .await;
                let events = dedup_by_url(events, |e| e.url.as_str());
                self.submit_events(SITE_NAME, &events, summary).await
            }
        }
    }

    async fn run_feed(&self, feed: &FeedSource, summary: RunSummary) -> RunSummary {
        let source = feed.source.as_str();
        self.log
            .info(&format!("Fetching feed: {source}"), json!({ "url": feed.url }))
            .await;

        let body = match self.fetch_timed(&feed.url).await {
            Ok(b) => b,
            Err(e) => return self.source_failed(summary, source, e.into(), json!({})).await,
        };

        let now = Utc::now();
        let items = match parse_feed(&body, now) {
            Ok(items) => items,
            Err(e) => {
                let extra = json!({ "sample": sample(&body, PARSE_SAMPLE_CHARS) });
                return self.source_failed(summary, source, e.into(), extra).await;
            }
        };

        if items.is_empty() {
            self.log
                .info(&format!("No items found in {source}"), json!({ "count": 0 }))
                .await;
            return summary;
        }
        counter!("ingest_items_total").increment(items.len() as u64);
        self.log
            .info(
                &format!("Parsed {} items from {source}", items.len()),
                json!({ "count": items.len() }),
            )
            .await;

        let batch = prepare_batch(source, items, self.config, now);
        for title in &batch.unlinked {
            self.log
                .warn("skip (no url)", json!({ "source": source, "title": title }))
                .await;
        }
        counter!("ingest_filtered_total")
            .increment((batch.unlinked.len() + batch.off_topic) as u64);

        let summary = self.submit_sources(source, &batch.sources, summary).await;
        self.submit_events(source, &batch.events, summary).await
    }

    async fn submit_sources(
        &self,
        source: &str,
        rows: &[SourceRecord],
        summary: RunSummary,
    ) -> RunSummary {
        if rows.is_empty() {
            return summary;
        }
        self.announce_upsert(source, Table::SourcesRaw, rows.len()).await;
        let res = self.store.upsert_sources(rows).await;
        self.record_upsert(summary, source, Table::SourcesRaw, rows.len(), res)
            .await
    }

    async fn submit_events(
        &self,
        source: &str,
        rows: &[EventRecord],
        summary: RunSummary,
    ) -> RunSummary {
        if rows.is_empty() {
            return summary;
        }
        self.announce_upsert(source, Table::Events, rows.len()).await;
        let res = self.store.upsert_events(rows).await;
        self.record_upsert(summary, source, Table::Events, rows.len(), res)
            .await
    }

    async fn announce_upsert(&self, source: &str, table: Table, n: usize) {
        self.log
            .info(
                &format!("Upserting {n} items to {table}"),
                json!({ "source": source }),
            )
            .await;
    }

    async fn record_upsert(
        &self,
        summary: RunSummary,
        source: &str,
        table: Table,
        n: usize,
        res: Result<(), PersistenceError>,
    ) -> RunSummary {
        match res {
            Ok(()) => {
                counter!("ingest_rows_ok_total", "table" => table.as_str()).increment(n as u64);
                summary.record_batch(table, n, true)
            }
            Err(e) => {
                counter!("ingest_rows_failed_total", "table" => table.as_str())
                    .increment(n as u64);
                self.log
                    .error(
                        &format!("Failed to batch upsert {table} for {source}"),
                        json!({ "code": e.code(), "message": e.to_string() }),
                    )
                    .await;
                summary
                    .record_batch(table, n, false)
                    .push_error(source, format!("DB upsert failed ({table})"))
            }
        }
    }

    async fn source_failed(
        &self,
        summary: RunSummary,
        source: &str,
        err: SourceError,
        extra: Value,
    ) -> RunSummary {
        counter!("ingest_source_errors_total").increment(1);
        let message = match &err {
            SourceError::Fetch(FetchError::Timeout) => {
                format!("Fetch timed out for feed: {source}")
            }
            SourceError::Parse(
                ParseError::Xml(_) | ParseError::UnclosedElement(_) | ParseError::NoRoot,
            ) => format!("XML parse error: {source}"),
            _ => format!("Error processing feed: {source}"),
        };
        let mut details = json!({ "error": err.to_string() });
        if let (Some(d), Value::Object(more)) = (details.as_object_mut(), extra) {
            d.extend(more);
        }
        self.log.error(&message, details).await;
        summary.push_error(source, err.summary_text())
    }
}

/// Convenience entry: `Pipeline` over the given collaborators.
pub async fn run_once(
    config: &IngestConfig,
    fetcher: &dyn FeedFetcher,
    store: &dyn RecordStore,
    log: &dyn RunLogger,
) -> RunSummary {
    Pipeline {
        config,
        fetcher,
        store,
        log,
    }
    .run()
    .await
}

/// Production wiring: REST store and the configured log sink.
pub async fn run_with_config(config: &IngestConfig, fetcher: &dyn FeedFetcher) -> RunSummary {
    let log = select_logger(config);
    log.info(
        "Environment variables read",
        json!({
            "SUPABASE_URL_present": true,
            "SERVICE_KEY_present": true,
            "SERVICE_KEY_masked": config.store.masked_key(),
            "feeds": config.feeds.len(),
        }),
    )
    .await;
    let store = RestStore::new(config.store.clone());
    run_once(config, fetcher, &store, log.as_ref()).await
}
