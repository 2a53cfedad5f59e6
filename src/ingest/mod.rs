//! Ingest execution: move a matched file into the library and record the
//! outcome.
//!
//! [`IngestExecutor::execute`] is atomic from the router's point of view:
//! either the file is copied, size-verified, and logged as `success`, or the
//! partial destination and any directories created on the way are removed,
//! the source is left untouched, and a `failed` history row is written.
//! Only a durable-store failure propagates as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::db::models::{HistoryRecord, HistoryStatus, QueueStatus};
use crate::db::pool::{get_conn, DbPool};
use crate::db::queries::{history, queue};
use crate::error::{Error, Result};
use crate::guess::{Guess, MediaKind};
use crate::matcher::MatchResult;
use crate::metadata::MetadataProvider;
use crate::planner::PathPlanner;

/// Executes ingest decisions against the filesystem and the store.
pub struct IngestExecutor {
    pool: DbPool,
    planner: PathPlanner,
    provider: Arc<dyn MetadataProvider>,
}

impl IngestExecutor {
    pub fn new(pool: DbPool, planner: PathPlanner, provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            pool,
            planner,
            provider,
        }
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    /// Copy `source` to its planned destination and write a history row.
    ///
    /// Returns the history record for both success and copy failure; an
    /// `Err` means the store itself could not be written, which callers
    /// must treat as fatal to automatic processing.
    pub async fn execute(
        &self,
        m: &MatchResult,
        guess: &Guess,
        source: &Path,
    ) -> Result<HistoryRecord> {
        let started = Instant::now();

        let episode_title = self.lookup_episode_title(m, guess).await;
        let destination = self.planner.plan(&m.candidate, guess, episode_title.as_deref());

        let source_owned = source.to_path_buf();
        let destination_owned = destination.clone();
        let copy_result = tokio::task::spawn_blocking(move || {
            copy_and_verify(&source_owned, &destination_owned)
        })
        .await
        .map_err(|e| Error::internal(format!("copy task panicked: {e}")))?;

        let duration_ms = started.elapsed().as_millis() as i64;
        let conn = get_conn(&self.pool)?;

        match copy_result {
            Ok(bytes) => {
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    bytes,
                    "ingested"
                );
                history::add_record(
                    &conn,
                    history::NewRecord {
                        source_path: &source.to_string_lossy(),
                        destination_path: Some(&destination.to_string_lossy()),
                        external_id: m.candidate.external_id as i64,
                        media_kind: &m.candidate.media_kind.to_string(),
                        confidence: m.confidence,
                        status: HistoryStatus::Success,
                        error: None,
                        duration_ms,
                        size_bytes: bytes as i64,
                    },
                )
            }
            Err(e) => {
                error!(
                    source = %source.display(),
                    destination = %destination.display(),
                    error = %e,
                    "ingest failed, destination rolled back"
                );
                history::add_record(
                    &conn,
                    history::NewRecord {
                        source_path: &source.to_string_lossy(),
                        destination_path: None,
                        external_id: m.candidate.external_id as i64,
                        media_kind: &m.candidate.media_kind.to_string(),
                        confidence: m.confidence,
                        status: HistoryStatus::Failed,
                        error: Some(&e.to_string()),
                        duration_ms,
                        size_bytes: 0,
                    },
                )
            }
        }
    }

    /// Approve a pending queue item: transition it, then run the ingest
    /// contract with its stored top candidate.
    pub async fn approve(&self, path: &str) -> Result<HistoryRecord> {
        let item = {
            let conn = get_conn(&self.pool)?;
            let item = queue::get_pending_by_path(&conn, path)?
                .ok_or_else(|| Error::not_found(format!("no pending queue item for {path}")))?;

            // One-shot transition; a concurrent approve loses here.
            if !queue::set_status(&conn, &item.id, QueueStatus::Approved)? {
                return Err(Error::invalid_input(format!(
                    "queue item for {path} was already decided"
                )));
            }
            item
        };

        let top = item
            .candidates
            .first()
            .ok_or_else(|| Error::invalid_input("queue item has no candidates"))?;

        self.execute(top, &item.guess, Path::new(&item.source_path))
            .await
    }

    /// Reject a pending queue item.
    pub fn reject(&self, path: &str, reason: Option<&str>) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let item = queue::get_pending_by_path(&conn, path)?
            .ok_or_else(|| Error::not_found(format!("no pending queue item for {path}")))?;

        if !queue::set_status(&conn, &item.id, QueueStatus::Rejected)? {
            return Err(Error::invalid_input(format!(
                "queue item for {path} was already decided"
            )));
        }

        info!(path, reason = reason.unwrap_or("none given"), "queue item rejected");
        Ok(())
    }

    async fn lookup_episode_title(&self, m: &MatchResult, guess: &Guess) -> Option<String> {
        if m.candidate.media_kind != MediaKind::Tv {
            return None;
        }
        let (season, episode) = (guess.season?, guess.episode?);

        match self
            .provider
            .episode_title(m.candidate.external_id, season, episode)
            .await
        {
            Ok(title) => title,
            Err(e) => {
                warn!(error = %e, "episode title lookup failed, naming without it");
                None
            }
        }
    }
}

/// Copy with size verification and full rollback on failure.
///
/// Invariant: on any error the destination does not exist, newly created
/// directories are removed, and the source is untouched.
fn copy_and_verify(source: &Path, destination: &Path) -> Result<u64> {
    let source_len = std::fs::metadata(source)
        .map_err(|e| Error::copy_failed(format!("cannot stat source {}: {e}", source.display())))?
        .len();

    if destination.exists() {
        return Err(Error::copy_failed(format!(
            "destination already exists: {}",
            destination.display()
        )));
    }

    let created_dirs = create_missing_dirs(destination)?;

    match try_copy(source, destination, source_len) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            rollback(destination, &created_dirs);
            Err(e)
        }
    }
}

fn try_copy(source: &Path, destination: &Path, expected_len: u64) -> Result<u64> {
    let bytes = std::fs::copy(source, destination)
        .map_err(|e| Error::copy_failed(format!("copy failed: {e}")))?;

    let written = std::fs::metadata(destination)
        .map_err(|e| Error::copy_failed(format!("cannot stat destination: {e}")))?
        .len();

    if written != expected_len {
        return Err(Error::copy_failed(format!(
            "size mismatch after copy: expected {expected_len}, wrote {written}"
        )));
    }

    Ok(bytes)
}

/// Create the destination's parent directories, returning the ones that did
/// not exist before, topmost first.
fn create_missing_dirs(destination: &Path) -> Result<Vec<PathBuf>> {
    let parent = match destination.parent() {
        Some(parent) => parent,
        None => return Ok(Vec::new()),
    };

    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(parent);
    while let Some(dir) = cursor {
        if dir.exists() || dir.as_os_str().is_empty() {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }
    missing.reverse();

    std::fs::create_dir_all(parent)
        .map_err(|e| Error::copy_failed(format!("cannot create {}: {e}", parent.display())))?;

    Ok(missing)
}

/// Best-effort removal of the partial destination and any directories this
/// execution created. `remove_dir` refuses non-empty directories, so a dir
/// that gained unrelated content in the meantime survives.
fn rollback(destination: &Path, created_dirs: &[PathBuf]) {
    let _ = std::fs::remove_file(destination);
    for dir in created_dirs.iter().rev() {
        let _ = std::fs::remove_dir(dir);
    }
}
