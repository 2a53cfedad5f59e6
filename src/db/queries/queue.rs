//! Review queue operations.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::models::{QueueItem, QueueStatus};
use crate::error::{Error, Result};
use crate::guess::Guess;
use crate::matcher::MatchResult;

const COLS: &str = "id, source_path, guess, candidates, confidence, reason,
    status, enqueued_at, decided_at";

/// Create a new pending queue item.
///
/// Callers must have checked for an existing pending item on the same path
/// first (routing does); this function does not overwrite.
pub fn create_item(
    conn: &Connection,
    source_path: &str,
    guess: &Guess,
    candidates: &[MatchResult],
    reason: Option<&str>,
) -> Result<QueueItem> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let confidence = candidates.first().map(|m| m.confidence).unwrap_or(0.0);

    let guess_json =
        serde_json::to_string(guess).map_err(|e| Error::database(e.to_string()))?;
    let candidates_json =
        serde_json::to_string(candidates).map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO queue_items (id, source_path, guess, candidates, confidence, reason, status, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        rusqlite::params![id, source_path, guess_json, candidates_json, confidence, reason, &now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(QueueItem {
        id,
        source_path: source_path.to_string(),
        guess: guess.clone(),
        candidates: candidates.to_vec(),
        confidence,
        reason: reason.map(String::from),
        status: QueueStatus::Pending,
        enqueued_at: now,
        decided_at: None,
    })
}

/// Get the pending queue item for a source path, if one exists.
pub fn get_pending_by_path(conn: &Connection, source_path: &str) -> Result<Option<QueueItem>> {
    let q = format!(
        "SELECT {COLS} FROM queue_items
         WHERE source_path = ?1 AND status = 'pending'
         ORDER BY enqueued_at DESC LIMIT 1"
    );
    match conn.query_row(&q, [source_path], QueueItem::from_row) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get the most recent queue item for a source path regardless of status.
pub fn get_latest_by_path(conn: &Connection, source_path: &str) -> Result<Option<QueueItem>> {
    let q = format!(
        "SELECT {COLS} FROM queue_items
         WHERE source_path = ?1
         ORDER BY enqueued_at DESC LIMIT 1"
    );
    match conn.query_row(&q, [source_path], QueueItem::from_row) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List queue items, optionally filtered by status, newest first.
pub fn list(conn: &Connection, status: Option<QueueStatus>, limit: i64) -> Result<Vec<QueueItem>> {
    match status {
        Some(s) => {
            let q = format!(
                "SELECT {COLS} FROM queue_items WHERE status = ?1
                 ORDER BY enqueued_at DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![s.as_str(), limit], QueueItem::from_row)
                .map_err(|e| Error::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e.to_string()))?;
            Ok(rows)
        }
        None => {
            let q = format!("SELECT {COLS} FROM queue_items ORDER BY enqueued_at DESC LIMIT ?1");
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![limit], QueueItem::from_row)
                .map_err(|e| Error::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e.to_string()))?;
            Ok(rows)
        }
    }
}

/// Transition a queue item's status, stamping the decision time.
///
/// Returns false when the item does not exist or is no longer pending --
/// decisions are one-shot.
pub fn set_status(conn: &Connection, id: &str, status: QueueStatus) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE queue_items SET status = ?1, decided_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            rusqlite::params![status.as_str(), now, id],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Number of items currently awaiting review.
pub fn count_pending(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM queue_items WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}
