//! Filesystem watching for the ingest directory.
//!
//! The notify backend delivers events on its own thread; they are bridged
//! into the async world over a single-producer channel and drained by the
//! service's consumer task, which owns the [`ArrivalTracker`]. Nothing on
//! the event-delivery path ever touches the network or the store.

pub mod tracker;

pub use tracker::{ArrivalRecord, ArrivalState, ArrivalTracker, PollOutcome, TrackerConfig};

use std::path::{Path, PathBuf};

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::guess::is_media_file;

/// Create a recursive watcher on `ingest_dir` that forwards create/modify
/// events for allow-listed media files into `event_tx`.
///
/// The returned watcher stops delivering events when dropped; the service
/// holds it for its lifetime.
pub fn spawn_watcher(
    ingest_dir: &Path,
    extensions: Vec<String>,
    event_tx: mpsc::Sender<PathBuf>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_create() || event.kind.is_modify() {
                    for path in event.paths {
                        if is_media_file(&path, &extensions) {
                            // Queue-full means the consumer is far behind;
                            // the startup rescan picks the file up later.
                            let _ = event_tx.blocking_send(path);
                        }
                    }
                }
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| Error::internal(format!("failed to create file watcher: {e}")))?;

    watcher
        .watch(ingest_dir, RecursiveMode::Recursive)
        .map_err(|e| Error::internal(format!("failed to watch {}: {e}", ingest_dir.display())))?;

    tracing::info!(dir = %ingest_dir.display(), "watching ingest directory");
    Ok(watcher)
}
