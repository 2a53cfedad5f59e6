//! Long-lived ingest service: lifecycle, event plumbing, and the worker
//! pool.
//!
//! [`IngestService`] owns the notify watcher, the consumer task that drives
//! the [`ArrivalTracker`](crate::watch::ArrivalTracker), and a bounded pool
//! of identify+ingest workers. It is an explicit state object with
//! `start` / `stop` / `status`; restarting reconstructs in-flight arrivals
//! by rescanning the ingest directory, while queue and history state lives
//! in SQLite and survives on its own.
//!
//! Event intake never blocks on the network or on file copies: the notify
//! callback only pushes paths into a channel, and promoted files are handed
//! to spawned workers gated by a semaphore.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::RecommendedWatcher;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::pool::{get_conn, DbPool};
use crate::db::queries::{history, queue};
use crate::error::{Error, Result};
use crate::guess::is_media_file;
use crate::ingest::IngestExecutor;
use crate::matcher::{MatchSet, MediaMatcher};
use crate::routing::{route, RoutingDecision, RoutingPolicy};
use crate::watch::{spawn_watcher, ArrivalTracker, TrackerConfig};

/// Operational snapshot exposed for visibility.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub queue_depth: i64,
    pub processed_count: u64,
    pub error_count: u64,
}

/// The monitoring process: watcher + tracker + worker pool, with an owned
/// lifecycle.
pub struct IngestService {
    config: Arc<Config>,
    pool: DbPool,
    matcher: Arc<MediaMatcher>,
    executor: Arc<IngestExecutor>,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    watcher: Option<RecommendedWatcher>,
    consumer: Option<JoinHandle<()>>,
}

impl IngestService {
    pub fn new(
        config: Arc<Config>,
        pool: DbPool,
        matcher: Arc<MediaMatcher>,
        executor: Arc<IngestExecutor>,
    ) -> Self {
        Self {
            config,
            pool,
            matcher,
            executor,
            running: Arc::new(AtomicBool::new(false)),
            processed: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            shutdown_tx: None,
            watcher: None,
            consumer: None,
        }
    }

    /// Start watching the ingest directory and processing arrivals.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_input("service is already running"));
        }

        let watch = &self.config.watch;
        let (event_tx, event_rx) = mpsc::channel::<PathBuf>(256);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let watcher =
            match spawn_watcher(&watch.ingest_dir, watch.extensions.clone(), event_tx.clone()) {
                Ok(watcher) => watcher,
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
        self.watcher = Some(watcher);
        self.shutdown_tx = Some(shutdown_tx);

        // Files that arrived while we were down get re-tracked from a scan;
        // their stability cycle simply starts over.
        let rescan_tx = event_tx.clone();
        let rescan_dir = watch.ingest_dir.clone();
        let rescan_exts = watch.extensions.clone();
        let rescan_pool = self.pool.clone();
        tokio::spawn(async move {
            match unhandled_media_files(rescan_pool, rescan_dir, rescan_exts).await {
                Ok(paths) => {
                    if !paths.is_empty() {
                        info!(count = paths.len(), "re-tracking files found on startup scan");
                    }
                    for path in paths {
                        if rescan_tx.send(path).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "startup rescan failed"),
            }
        });

        let consumer = ConsumerTask {
            pool: self.pool.clone(),
            matcher: self.matcher.clone(),
            executor: self.executor.clone(),
            policy: RoutingPolicy::from_config(&self.config),
            tracker_config: TrackerConfig {
                stability_window: Duration::from_secs(watch.stability_window_secs),
                absolute_timeout: Duration::from_secs(watch.stability_timeout_secs),
                max_checking: watch.max_concurrent_checks,
            },
            poll_interval: Duration::from_secs(watch.poll_interval_secs),
            max_concurrent_ingests: watch.max_concurrent_ingests,
            running: self.running.clone(),
            processed: self.processed.clone(),
            errors: self.errors.clone(),
        };
        self.consumer = Some(tokio::spawn(consumer.run(event_rx, shutdown_rx)));

        info!(dir = %watch.ingest_dir.display(), "ingest service started");
        Ok(())
    }

    /// Stop the service: cease event intake, let in-flight work drain, and
    /// report final counts.
    pub async fn stop(&mut self) -> Result<ServiceStatus> {
        if !self.running.load(Ordering::SeqCst) {
            return self.status();
        }

        // Dropping the watcher stops new filesystem events.
        self.watcher = None;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.await;
        }

        self.running.store(false, Ordering::SeqCst);
        let status = self.status()?;
        info!(
            processed = status.processed_count,
            errors = status.error_count,
            queue_depth = status.queue_depth,
            "ingest service stopped"
        );
        Ok(status)
    }

    /// Current operational status.
    pub fn status(&self) -> Result<ServiceStatus> {
        let conn = get_conn(&self.pool)?;
        Ok(ServiceStatus {
            running: self.running.load(Ordering::SeqCst),
            queue_depth: queue::count_pending(&conn)?,
            processed_count: self.processed.load(Ordering::SeqCst),
            error_count: self.errors.load(Ordering::SeqCst),
        })
    }
}

/// State owned by the consumer loop.
struct ConsumerTask {
    pool: DbPool,
    matcher: Arc<MediaMatcher>,
    executor: Arc<IngestExecutor>,
    policy: RoutingPolicy,
    tracker_config: TrackerConfig,
    poll_interval: Duration,
    max_concurrent_ingests: usize,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl ConsumerTask {
    async fn run(self, mut event_rx: mpsc::Receiver<PathBuf>, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut tracker = ArrivalTracker::new(self.tracker_config);
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_ingests));
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("consumer shutting down, draining in-flight work");
                    break;
                }

                Some(path) = event_rx.recv() => {
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.is_file() => {
                            if tracker.observe(path.clone(), meta.len(), Instant::now()) {
                                info!(path = %path.display(), size = meta.len(), "new file detected");
                            }
                        }
                        _ => debug!(path = %path.display(), "event for non-file path ignored"),
                    }
                }

                _ = interval.tick() => {
                    let outcome = tracker.poll(Instant::now(), |p| {
                        std::fs::metadata(p).ok().map(|m| m.len())
                    });

                    for path in outcome.timed_out {
                        self.errors.fetch_add(1, Ordering::SeqCst);
                        error!(
                            path = %path.display(),
                            "file never reached a stable size, giving up (manual intervention required)"
                        );
                    }

                    for path in outcome.promoted {
                        info!(path = %path.display(), "file stable, handing to identification");
                        let worker = Worker {
                            pool: self.pool.clone(),
                            matcher: self.matcher.clone(),
                            executor: self.executor.clone(),
                            policy: self.policy,
                            running: self.running.clone(),
                            processed: self.processed.clone(),
                            errors: self.errors.clone(),
                        };
                        let semaphore = semaphore.clone();
                        workers.spawn(async move {
                            let _permit = match semaphore.acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => return,
                            };
                            worker.process(path).await;
                        });
                    }
                }

                // Reap finished workers so the set does not grow unbounded.
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
            }

            // A worker that hit a store failure flips this off; stop taking
            // work rather than continuing with unknown state.
            if !self.running.load(Ordering::SeqCst) {
                error!("automatic processing halted");
                break;
            }
        }

        while workers.join_next().await.is_some() {}
    }
}

/// One identify -> route -> execute unit of work.
struct Worker {
    pool: DbPool,
    matcher: Arc<MediaMatcher>,
    executor: Arc<IngestExecutor>,
    policy: RoutingPolicy,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl Worker {
    async fn process(&self, path: PathBuf) {
        match self.process_inner(&path).await {
            Ok(()) => {}
            Err(e @ Error::Database(_)) => {
                // Without the store there is no exactly-once guarantee.
                error!(path = %path.display(), error = %e, "store failure, halting automatic processing");
                self.running.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                error!(path = %path.display(), error = %e, "processing failed");
            }
        }
    }

    async fn process_inner(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let match_set = self.matcher.match_file(&file_name).await;

        let decision = {
            let conn = get_conn(&self.pool)?;
            route(&conn, path, &match_set, &self.policy)?
        };

        match decision {
            RoutingDecision::AutoIngest(m) => {
                let record = self.executor.execute(&m, &match_set.guess, path).await?;
                match record.status {
                    crate::db::HistoryStatus::Success => {
                        self.processed.fetch_add(1, Ordering::SeqCst);
                    }
                    crate::db::HistoryStatus::Failed => {
                        self.errors.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            RoutingDecision::Queue(_) => {
                self.processed.fetch_add(1, Ordering::SeqCst);
            }
            RoutingDecision::Reject(reason) => {
                info!(path = %path.display(), %reason, "rejected");
                self.processed.fetch_add(1, Ordering::SeqCst);
            }
        }

        Ok(())
    }
}

/// Walk a directory for allow-listed media files.
pub fn collect_media_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_media_file(path, extensions))
        .collect();
    files.sort();
    files
}

/// Media files in the ingest directory with no queue or history record --
/// the set a restart needs to re-track.
async fn unhandled_media_files(
    pool: DbPool,
    dir: PathBuf,
    extensions: Vec<String>,
) -> Result<Vec<PathBuf>> {
    let files = tokio::task::spawn_blocking(move || collect_media_files(&dir, &extensions))
        .await
        .map_err(|e| Error::internal(format!("scan task panicked: {e}")))?;

    let conn = get_conn(&pool)?;
    let mut unhandled = Vec::new();
    for path in files {
        let path_str = path.to_string_lossy();
        let decided = queue::get_latest_by_path(&conn, &path_str)?.is_some()
            || history::any_for_path(&conn, &path_str)?;
        if !decided {
            unhandled.push(path);
        }
    }
    Ok(unhandled)
}

/// Identify every media file under `dir`, up to `concurrency` files at a
/// time. Results come back in path order for reproducible output.
pub async fn batch_identify(
    matcher: Arc<MediaMatcher>,
    dir: &Path,
    extensions: &[String],
    concurrency: usize,
) -> Vec<(PathBuf, MatchSet)> {
    let files = {
        let dir = dir.to_path_buf();
        let extensions = extensions.to_vec();
        tokio::task::spawn_blocking(move || collect_media_files(&dir, &extensions))
            .await
            .unwrap_or_default()
    };

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<(PathBuf, MatchSet)> = JoinSet::new();

    for path in files {
        let matcher = matcher.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let match_set = matcher.match_file(&file_name).await;
            (path, match_set)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(pair) = joined {
            results.push(pair);
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}
