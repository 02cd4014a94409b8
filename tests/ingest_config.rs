// tests/ingest_config.rs
use alterna_monitor::error::ConfigError;
use alterna_monitor::ingest::config::{default_feeds, IngestConfig, LogSinkChoice};
use alterna_monitor::ingest::types::FeedSource;
use std::time::Duration;
use std::{env, fs};

const KEYS: [&str; 6] = [
    "SUPABASE_URL",
    "SUPABASE_SERVICE_ROLE_KEY",
    "INGEST_FEEDS_PATH",
    "INGEST_PAUSE_MS",
    "INGEST_LOG_SINK",
    "ALTERNA_SITE_URL",
];

fn clear_env() {
    for k in KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn missing_credentials_fail_before_anything_else() {
    clear_env();
    assert_eq!(
        IngestConfig::from_env().unwrap_err(),
        ConfigError::MissingCredentials
    );

    env::set_var("SUPABASE_URL", "https://x.supabase.co");
    assert_eq!(
        IngestConfig::from_env().unwrap_err().to_string(),
        "Missing SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY"
    );
    clear_env();
}

#[serial_test::serial]
#[test]
fn env_overrides_and_feed_file_fallbacks() {
    // Isolate CWD so the repo's own config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();
    env::set_var("SUPABASE_URL", "https://x.supabase.co/");
    env::set_var("SUPABASE_SERVICE_ROLE_KEY", "service-role");

    // 1) Nothing on disk: built-in feeds and defaults.
    let cfg = IngestConfig::from_env().unwrap();
    assert_eq!(cfg.store.base_url, "https://x.supabase.co");
    assert_eq!(cfg.feeds, default_feeds());
    assert_eq!(cfg.pause, Duration::from_millis(400));
    assert_eq!(cfg.log_sink, LogSinkChoice::Remote);

    // 2) ./config/feeds.toml replaces the built-in list.
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("feeds.toml"),
        r#"
[[feeds]]
source = "PRTIMES"
url = "https://prtimes.jp/index.rdf"
"#,
    )
    .unwrap();
    let cfg = IngestConfig::from_env().unwrap();
    assert_eq!(
        cfg.feeds,
        vec![FeedSource::new("PRTIMES", "https://prtimes.jp/index.rdf")]
    );

    // 3) INGEST_FEEDS_PATH wins over the fallback; other knobs apply too.
    let p_env = tmp.path().join("feeds.json");
    fs::write(&p_env, r#"[{"source":"BLOG","url":"https://blog.example.com/atom"}]"#).unwrap();
    env::set_var("INGEST_FEEDS_PATH", p_env.display().to_string());
    env::set_var("INGEST_PAUSE_MS", "25");
    env::set_var("INGEST_LOG_SINK", "local");
    env::set_var("ALTERNA_SITE_URL", "http://localhost:8080/");
    let cfg = IngestConfig::from_env().unwrap();
    assert_eq!(
        cfg.feeds,
        vec![FeedSource::new("BLOG", "https://blog.example.com/atom")]
    );
    assert_eq!(cfg.pause, Duration::from_millis(25));
    assert_eq!(cfg.log_sink, LogSinkChoice::Local);
    assert_eq!(cfg.site_url, "http://localhost:8080/");

    // 4) A broken explicit list is a config error, not a silent fallback.
    fs::write(&p_env, "not a feed list").unwrap();
    assert!(matches!(
        IngestConfig::from_env(),
        Err(ConfigError::FeedList(_))
    ));

    clear_env();
    env::set_current_dir(&old).unwrap();
}
