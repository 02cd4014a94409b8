// src/ingest/providers/alterna_site.rs
//! Partner-site integration: the landing page embeds its project list as
//! JSON inside a script tag. Only projects open for application become
//! NEW_LISTING events; no keyword filter applies here.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::classify::{EventType, SubscriptionMethod};
use crate::error::ParseError;
use crate::ingest::normalize_timestamp;
use crate::ingest::types::EventRecord;

pub const SITE_NAME: &str = "ALTERNA-Z";
pub const DATA_MARKER: &str = r#"<script id="__NUXT_DATA__" type="application/json">"#;
pub const PROJECTS_POINTER: &str = "/props/pageProps/projects";
pub const OPEN_STATUS: &str = "仮申込受付中";

static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9,]+").expect("amount regex"));
static RE_LEADING_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?[0-9]+(?:\.[0-9]+)?").expect("number regex"));

/// What the embedded payload held.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteData {
    Projects {
        total: usize,
        events: Vec<EventRecord>,
    },
    /// Payload decoded but the project list was missing or not an array.
    NoProjects { top_level_keys: Vec<String> },
}

/// JSON text between the marker and the next closing script tag.
pub fn extract_embedded_json(html: &str) -> Result<&str, ParseError> {
    let start = html.find(DATA_MARKER).ok_or(ParseError::MarkerNotFound)? + DATA_MARKER.len();
    let len = html[start..]
        .find("</script>")
        .ok_or(ParseError::UnclosedEmbeddedData)?;
    Ok(&html[start..start + len])
}

pub fn parse_site(html: &str, site_url: &str, now: DateTime<Utc>) -> Result<SiteData, ParseError> {
    let doc: Value = serde_json::from_str(extract_embedded_json(html)?)?;

    let Some(projects) = doc.pointer(PROJECTS_POINTER).and_then(Value::as_array) else {
        let top_level_keys = doc
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        return Ok(SiteData::NoProjects { top_level_keys });
    };

    let events = projects
        .iter()
        .filter_map(|p| project_event(p, site_url, now))
        .collect();
    Ok(SiteData::Projects {
        total: projects.len(),
        events,
    })
}

/// Event for one project, or `None` when it is not open for application or
/// has no id to build its url from.
pub fn project_event(p: &Value, site_url: &str, now: DateTime<Utc>) -> Option<EventRecord> {
    if p.get("status").and_then(Value::as_str) != Some(OPEN_STATUS) {
        return None;
    }
    let id = match p.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let published_at = match str_field(p, "application_start_at") {
        Some(raw) => normalize_timestamp(&raw, now),
        None => now.to_rfc3339(),
    };

    Some(EventRecord {
        url: format!("{}/projects/{}", site_url.trim_end_matches('/'), id),
        event_type: EventType::NewListing,
        project_name: str_field(p, "name").unwrap_or_default(),
        asset_type: str_field(p, "asset_type_name"),
        location: str_field(p, "address"),
        min_investment: p.get("min_investment").and_then(man_yen_amount),
        expected_yield: p
            .get("yield")
            .and_then(leading_number)
            .map(|pct| pct / 100.0),
        term_months: p
            .get("investment_period")
            .and_then(leading_number)
            .map(|m| m as i64),
        subscription_method: Some(SubscriptionMethod::Draw),
        sentiment: 0,
        published_at,
    })
}

fn str_field(p: &Value, key: &str) -> Option<String> {
    p.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// "50万円" / "1,000万円" / 50 → yen.
fn man_yen_amount(v: &Value) -> Option<f64> {
    let units = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let digits = RE_AMOUNT.find(s)?.as_str().replace(',', "");
            digits.parse::<u64>().ok()? as f64
        }
        _ => return None,
    };
    Some(units * 10_000.0)
}

/// Leading numeric prefix of a string or a plain number ("5.5%" → 5.5).
fn leading_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => RE_LEADING_NUM.find(s)?.as_str().trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
