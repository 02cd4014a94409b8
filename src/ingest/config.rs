// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::ORG_KEYWORDS;
use crate::error::ConfigError;
use crate::ingest::types::FeedSource;

const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
const ENV_FEEDS_PATH: &str = "INGEST_FEEDS_PATH";
const ENV_LOG_SINK: &str = "INGEST_LOG_SINK";
const ENV_PAUSE_MS: &str = "INGEST_PAUSE_MS";
const ENV_SITE_URL: &str = "ALTERNA_SITE_URL";

pub const DEFAULT_PAUSE_MS: u64 = 400;
pub const DEFAULT_SITE_URL: &str = "https://alterna-z.com/";
pub const CONTENT_MAX_CHARS: usize = 1000;

/// Built-in feed list used when no feed file is configured.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("PRTIMES", "https://prtimes.jp/index.rdf"),
        FeedSource::new(
            "GOOGLE_NEWS",
            "https://news.google.com/rss/search?q=%E3%82%AA%E3%83%AB%E3%82%BF%E3%83%8A+%E4%B8%89%E4%BA%95%E7%89%A9%E7%94%A3&hl=ja&gl=JP&ceid=JP:ja",
        ),
    ]
}

/// Credentials for the REST data endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub base_url: String,
    pub service_key: String,
}

impl StoreCredentials {
    /// First 4 chars of the key, for diagnostics.
    pub fn masked_key(&self) -> String {
        let head: String = self.service_key.chars().take(4).collect();
        format!("{head}...")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSinkChoice {
    Remote,
    Local,
}

/// Everything one run needs, resolved before any fetch happens.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub store: StoreCredentials,
    pub feeds: Vec<FeedSource>,
    pub site_url: String,
    pub keywords: Vec<String>,
    pub pause: Duration,
    pub content_max_chars: usize,
    pub log_sink: LogSinkChoice,
}

impl IngestConfig {
    /// Config with the given credentials and built-in defaults for the rest.
    pub fn with_credentials(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            store: StoreCredentials {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                service_key: service_key.into(),
            },
            feeds: default_feeds(),
            site_url: DEFAULT_SITE_URL.to_string(),
            keywords: ORG_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            pause: Duration::from_millis(DEFAULT_PAUSE_MS),
            content_max_chars: CONTENT_MAX_CHARS,
            log_sink: LogSinkChoice::Remote,
        }
    }

    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Resolve from any key lookup (env in production, a map in tests).
    pub fn from_lookup<F>(get: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let (Some(url), Some(key)) = (non_blank(ENV_SUPABASE_URL), non_blank(ENV_SERVICE_KEY))
        else {
            return Err(ConfigError::MissingCredentials);
        };

        let mut cfg = Self::with_credentials(url, key);

        cfg.feeds = match non_blank(ENV_FEEDS_PATH) {
            Some(p) => load_feeds_from(Path::new(&p))
                .map_err(|e| ConfigError::FeedList(format!("{e:#}")))?,
            None => load_feeds_fallback().map_err(|e| ConfigError::FeedList(format!("{e:#}")))?,
        };
        if let Some(site) = non_blank(ENV_SITE_URL) {
            cfg.site_url = site;
        }
        if let Some(ms) = non_blank(ENV_PAUSE_MS).and_then(|v| v.parse::<u64>().ok()) {
            cfg.pause = Duration::from_millis(ms);
        }
        if non_blank(ENV_LOG_SINK).is_some_and(|v| v.eq_ignore_ascii_case("local")) {
            cfg.log_sink = LogSinkChoice::Local;
        }
        Ok(cfg)
    }
}

/// Load a feed list from an explicit path. Supports TOML or JSON formats.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

/// config/feeds.toml, then config/feeds.json, then the built-in list.
fn load_feeds_fallback() -> Result<Vec<FeedSource>> {
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(default_feeds())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSource>> {
    #[derive(Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSource>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSource>> {
    let v: Vec<FeedSource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop blanks, drop repeated urls (first occurrence wins, order kept).
fn clean_list(items: Vec<FeedSource>) -> Vec<FeedSource> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|f| FeedSource::new(f.source.trim(), f.url.trim()))
        .filter(|f| !f.source.is_empty() && !f.url.is_empty())
        .filter(|f| seen.insert(f.url.clone()))
        .collect()
}
