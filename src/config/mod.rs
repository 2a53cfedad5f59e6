mod types;

pub use types::*;

use std::path::Path;

use anyhow::{Context, Result};

use crate::matcher::Weights;

/// Load configuration from a TOML file, apply environment overrides, and
/// validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or fall back to defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelsort.toml",
        "./config.toml",
        "~/.config/reelsort/config.toml",
        "/etc/reelsort/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Recognized environment overrides for the configuration surface.
fn apply_env_overrides(config: &mut Config) {
    fn var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    if let Some(v) = var("REELSORT_LIBRARY_ROOT") {
        config.library.root = v.into();
    }
    if let Some(v) = var("REELSORT_INGEST_DIR") {
        config.watch.ingest_dir = v.into();
    }
    if let Some(v) = var("REELSORT_WATCH_ENABLED") {
        config.watch.enabled = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = var("REELSORT_AUTO_INGEST") {
        config.matching.auto_ingest = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = var("REELSORT_CONFIDENCE_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.matching.auto_threshold = v;
    }
    if let Some(v) = var("REELSORT_POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.watch.poll_interval_secs = v;
    }
    if let Some(v) = var("REELSORT_STABILITY_WINDOW_SECS").and_then(|v| v.parse().ok()) {
        config.watch.stability_window_secs = v;
    }
    if let Some(v) = var("REELSORT_STABILITY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.watch.stability_timeout_secs = v;
    }
    if let Some(v) = var("REELSORT_MAX_CONCURRENT_INGESTS").and_then(|v| v.parse().ok()) {
        config.watch.max_concurrent_ingests = v;
    }
    if let Some(v) = var("REELSORT_TMDB_API_KEY") {
        config.tmdb.api_key = v;
    }
}

/// Validate configuration, including the scoring-weight invariant, which is
/// checked once here rather than per score call.
fn validate_config(config: &Config) -> Result<()> {
    Weights::default()
        .validate()
        .context("scoring weights are invalid")?;

    let m = &config.matching;
    if !(0.0..=1.0).contains(&m.auto_threshold) || !(0.0..=1.0).contains(&m.medium_threshold) {
        anyhow::bail!("confidence thresholds must be within [0, 1]");
    }
    if m.medium_threshold > m.auto_threshold {
        anyhow::bail!(
            "medium threshold ({}) cannot exceed auto threshold ({})",
            m.medium_threshold,
            m.auto_threshold
        );
    }

    let w = &config.watch;
    if w.poll_interval_secs == 0 {
        anyhow::bail!("poll interval cannot be 0");
    }
    if w.stability_timeout_secs <= w.stability_window_secs {
        anyhow::bail!("stability timeout must exceed the stability window");
    }
    if w.max_concurrent_ingests == 0 || w.max_concurrent_checks == 0 {
        anyhow::bail!("concurrency limits cannot be 0");
    }

    if w.enabled && !w.ingest_dir.exists() {
        tracing::warn!(dir = %w.ingest_dir.display(), "ingest directory does not exist");
    }

    Ok(())
}
