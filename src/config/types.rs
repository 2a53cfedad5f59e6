use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root of the media library the planner builds paths under.
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
}

fn default_library_root() -> PathBuf {
    PathBuf::from("/data/media")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_library_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory watched for arriving files.
    #[serde(default = "default_ingest_dir")]
    pub ingest_dir: PathBuf,

    /// Extension allow-list; empty means the built-in media list.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Seconds between size re-checks of tracked files.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds a size must stay unchanged before a file is promoted.
    #[serde(default = "default_stability_window")]
    pub stability_window_secs: u64,

    /// Absolute ceiling in seconds from detection to promotion.
    #[serde(default = "default_stability_timeout")]
    pub stability_timeout_secs: u64,

    /// Maximum paths size-polled concurrently.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Maximum concurrent identify+ingest executions.
    #[serde(default = "default_max_concurrent_ingests")]
    pub max_concurrent_ingests: usize,
}

fn default_ingest_dir() -> PathBuf {
    PathBuf::from("/data/ingest")
}
fn default_poll_interval() -> u64 {
    10
}
fn default_stability_window() -> u64 {
    60
}
fn default_stability_timeout() -> u64 {
    600
}
fn default_max_concurrent_checks() -> usize {
    8
}
fn default_max_concurrent_ingests() -> usize {
    4
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ingest_dir: default_ingest_dir(),
            extensions: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            stability_window_secs: default_stability_window(),
            stability_timeout_secs: default_stability_timeout(),
            max_concurrent_checks: default_max_concurrent_checks(),
            max_concurrent_ingests: default_max_concurrent_ingests(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Auto-ingest high-confidence matches without review.
    #[serde(default)]
    pub auto_ingest: bool,

    /// Minimum confidence for auto-ingest (the HIGH tier bound).
    #[serde(default = "default_auto_threshold")]
    pub auto_threshold: f64,

    /// Lower bound of the MEDIUM tier.
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    /// Seconds a cached metadata search stays fresh.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Concurrent files during batch identification.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_auto_threshold() -> f64 {
    0.85
}
fn default_medium_threshold() -> f64 {
    0.70
}
fn default_cache_ttl() -> u64 {
    86_400
}
fn default_batch_concurrency() -> usize {
    5
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_ingest: false,
            auto_threshold: default_auto_threshold(),
            medium_threshold: default_medium_threshold(),
            cache_ttl_secs: default_cache_ttl(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB v3 API key; empty disables metadata lookups.
    #[serde(default)]
    pub api_key: String,

    /// ISO-639-1 language tag for results.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: default_language(),
        }
    }
}
