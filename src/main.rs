mod cli;

use reelsort::{
    config,
    db::{self, models::HistoryStatus, queries},
    ingest::IngestExecutor,
    matcher::{tier, MediaMatcher},
    metadata::providers::TmdbProvider,
    metadata::MetadataProvider,
    planner::PathPlanner,
    service::{self, IngestService},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise derive a default from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelsort=trace".to_string()
        } else {
            "reelsort=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start => start(cli.config.as_deref()).await,
        Commands::Identify { file } => identify(cli.config.as_deref(), &file).await,
        Commands::Batch { dir } => batch(cli.config.as_deref(), &dir).await,
        Commands::Queue { all } => show_queue(cli.config.as_deref(), all),
        Commands::Approve { path } => approve(cli.config.as_deref(), &path).await,
        Commands::Reject { path, reason } => reject(cli.config.as_deref(), &path, reason.as_deref()),
        Commands::History { limit, status } => history(cli.config.as_deref(), limit, status.as_deref()),
        Commands::Status => status(cli.config.as_deref()),
        Commands::Validate { config: config_path } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Version => {
            println!("reelsort {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Everything a command needs: config, store, matcher, executor.
struct AppContext {
    config: Arc<config::Config>,
    pool: db::DbPool,
    matcher: Arc<MediaMatcher>,
    executor: Arc<IngestExecutor>,
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext> {
    let config = Arc::new(config::load_config_or_default(config_path)?);

    let data_dir = config_path
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let db_path = data_dir.join("reelsort.db");
    let pool = db::init_pool(&db_path.to_string_lossy())
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    let provider: Arc<dyn MetadataProvider> = Arc::new(TmdbProvider::new(
        config.tmdb.api_key.clone(),
        config.tmdb.language.clone(),
    ));
    if !provider.is_available() {
        tracing::warn!("no TMDB API key configured; identification will find no candidates");
    }

    let matcher = Arc::new(MediaMatcher::new(
        provider.clone(),
        Duration::from_secs(config.matching.cache_ttl_secs),
    )?);

    let planner = PathPlanner::new(config.library.root.clone());
    let executor = Arc::new(IngestExecutor::new(pool.clone(), planner, provider));

    Ok(AppContext {
        config,
        pool,
        matcher,
        executor,
    })
}

async fn start(config_path: Option<&Path>) -> Result<()> {
    let ctx = build_context(config_path)?;
    if !ctx.config.watch.enabled {
        anyhow::bail!("watching is disabled; set [watch] enabled = true in the config");
    }
    if !ctx.config.watch.ingest_dir.is_dir() {
        anyhow::bail!(
            "ingest directory does not exist: {}",
            ctx.config.watch.ingest_dir.display()
        );
    }

    let mut service = IngestService::new(
        ctx.config.clone(),
        ctx.pool.clone(),
        ctx.matcher.clone(),
        ctx.executor.clone(),
    );
    service.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    let final_status = service.stop().await?;
    println!(
        "Stopped. processed={} errors={} queue_depth={}",
        final_status.processed_count, final_status.error_count, final_status.queue_depth
    );
    Ok(())
}

async fn identify(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let ctx = build_context(config_path)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let match_set = ctx.matcher.match_file(&file_name).await;
    let guess = &match_set.guess;

    println!("File: {}", file.display());
    println!(
        "Guess: title={:?} year={:?} kind={:?} season={:?} episode={:?}",
        guess.title, guess.year, guess.media_kind, guess.season, guess.episode
    );
    if !guess.quality_tags.is_empty() {
        let tags: Vec<&str> = guess.quality_tags.iter().map(String::as_str).collect();
        println!("Quality: {}", tags.join(", "));
    }

    if match_set.ranked.is_empty() {
        println!("\nNo candidates found.");
        return Ok(());
    }

    println!("\nCandidates:");
    for (i, m) in match_set.ranked.iter().take(5).enumerate() {
        let t = tier(
            m.confidence,
            ctx.config.matching.auto_threshold,
            ctx.config.matching.medium_threshold,
        );
        println!(
            "  {}. {} ({}) tmdb-{}  confidence={:.3} [{}]",
            i + 1,
            m.candidate.title,
            m.candidate
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "????".to_string()),
            m.candidate.external_id,
            m.confidence,
            t
        );
        println!(
            "     breakdown: title={:.2} year={:.2} ({:?}) popularity={:.2} type={:.2}",
            m.breakdown.title,
            m.breakdown.year,
            m.breakdown.year_signal,
            m.breakdown.popularity,
            m.breakdown.kind
        );
    }

    if let Some(top) = match_set.top() {
        let planned = ctx.executor.planner().plan(&top.candidate, guess, None);
        println!("\nPlanned destination: {}", planned.display());
    }

    Ok(())
}

async fn batch(config_path: Option<&Path>, dir: &Path) -> Result<()> {
    let ctx = build_context(config_path)?;
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let results = service::batch_identify(
        ctx.matcher.clone(),
        dir,
        &ctx.config.watch.extensions,
        ctx.config.matching.batch_concurrency,
    )
    .await;

    if results.is_empty() {
        println!("No media files found in {}", dir.display());
        return Ok(());
    }

    for (path, match_set) in &results {
        match match_set.top() {
            Some(top) => println!(
                "{}  ->  {} ({})  confidence={:.3}",
                path.display(),
                top.candidate.title,
                top.candidate
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "????".to_string()),
                top.confidence
            ),
            None => println!("{}  ->  no match", path.display()),
        }
    }
    Ok(())
}

fn show_queue(config_path: Option<&Path>, all: bool) -> Result<()> {
    let ctx = build_context(config_path)?;
    let conn = db::get_conn(&ctx.pool)?;

    let status = if all { None } else { Some(db::QueueStatus::Pending) };
    let items = queries::queue::list(&conn, status, 100)?;

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for item in items {
        println!(
            "[{}] {}  confidence={:.3}  enqueued={}",
            item.status, item.source_path, item.confidence, item.enqueued_at
        );
        if let Some(reason) = &item.reason {
            println!("    reason: {reason}");
        }
        for (i, m) in item.candidates.iter().take(3).enumerate() {
            println!(
                "    {}. {} ({}) tmdb-{}  confidence={:.3}",
                i + 1,
                m.candidate.title,
                m.candidate
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "????".to_string()),
                m.candidate.external_id,
                m.confidence
            );
        }
    }
    Ok(())
}

async fn approve(config_path: Option<&Path>, path: &Path) -> Result<()> {
    let ctx = build_context(config_path)?;
    let record = ctx
        .executor
        .approve(&path.to_string_lossy())
        .await
        .context("approve failed")?;

    match record.status {
        HistoryStatus::Success => println!(
            "Ingested {} -> {}",
            record.source_path,
            record.destination_path.as_deref().unwrap_or("?")
        ),
        HistoryStatus::Failed => println!(
            "Ingest failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        ),
    }
    Ok(())
}

fn reject(config_path: Option<&Path>, path: &Path, reason: Option<&str>) -> Result<()> {
    let ctx = build_context(config_path)?;
    ctx.executor
        .reject(&path.to_string_lossy(), reason)
        .context("reject failed")?;
    println!("Rejected {}", path.display());
    Ok(())
}

fn history(config_path: Option<&Path>, limit: i64, status: Option<&str>) -> Result<()> {
    let ctx = build_context(config_path)?;
    let conn = db::get_conn(&ctx.pool)?;

    let status = match status {
        Some(s) => Some(
            s.parse::<HistoryStatus>()
                .map_err(|_| anyhow::anyhow!("status must be 'success' or 'failed'"))?,
        ),
        None => None,
    };

    let records = queries::history::list(&conn, status, limit)?;
    if records.is_empty() {
        println!("No history.");
        return Ok(());
    }

    for r in records {
        match r.status {
            HistoryStatus::Success => println!(
                "[success] {} -> {}  tmdb-{}  confidence={:.3}  {}",
                r.source_path,
                r.destination_path.as_deref().unwrap_or("?"),
                r.external_id,
                r.confidence,
                r.created_at
            ),
            HistoryStatus::Failed => println!(
                "[failed]  {}  tmdb-{}  error: {}  {}",
                r.source_path,
                r.external_id,
                r.error.as_deref().unwrap_or("unknown"),
                r.created_at
            ),
        }
    }
    Ok(())
}

fn status(config_path: Option<&Path>) -> Result<()> {
    let ctx = build_context(config_path)?;
    let conn = db::get_conn(&ctx.pool)?;

    let pending = queries::queue::count_pending(&conn)?;
    let stats = queries::history::stats(&conn)?;

    println!("Queue depth:      {pending}");
    println!("Total processed:  {}", stats.total);
    println!("  succeeded:      {}", stats.successes);
    println!("  failed:         {}", stats.failures);
    println!("Success rate:     {:.1}%", stats.success_rate());
    println!("Bytes ingested:   {}", stats.bytes_ingested);
    println!();
    println!("Library root:     {}", ctx.config.library.root.display());
    println!("Ingest dir:       {}", ctx.config.watch.ingest_dir.display());
    println!("Auto-ingest:      {}", ctx.config.matching.auto_ingest);
    println!("Auto threshold:   {}", ctx.config.matching.auto_threshold);
    Ok(())
}

fn validate(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("Configuration is valid");
            println!("  Library root: {}", config.library.root.display());
            println!("  Watch enabled: {}", config.watch.enabled);
            println!("  Ingest dir: {}", config.watch.ingest_dir.display());
            println!("  Auto-ingest: {}", config.matching.auto_ingest);
            println!("  Auto threshold: {}", config.matching.auto_threshold);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("  Library root: {}", config.library.root.display());
            println!("  Ingest dir: {}", config.watch.ingest_dir.display());
        }
    }
    Ok(())
}
