// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::classify::{EventType, SubscriptionMethod};

/// One configured remote feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub source: String, // e.g. "PRTIMES", "GOOGLE_NEWS"
    pub url: String,
}

impl FeedSource {
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
        }
    }
}

/// Uniform item shape produced by every feed family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String, // empty = unusable
    pub content: String,
    pub published: String, // raw feed timestamp, or run time when absent
    pub author: String,
}

/// Row of the raw source archive (`sources_raw`), keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub source: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: String,
    pub author: String,
    pub fetched_at: String,
}

/// Row of the derived event stream (`al_tr_events`), keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub url: String,
    pub event_type: EventType,
    pub project_name: String,
    pub asset_type: Option<String>,
    pub location: Option<String>,
    pub min_investment: Option<f64>,
    pub expected_yield: Option<f64>,
    pub term_months: Option<i64>,
    pub subscription_method: Option<SubscriptionMethod>,
    pub sentiment: i8,
    pub published_at: String,
}
