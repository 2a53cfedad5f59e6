//! Ingest history operations.
//!
//! History rows are written once and never updated; the duplicate guard and
//! audit surface both read from here.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::models::{HistoryRecord, HistoryStatus, IngestStats};
use crate::error::{Error, Result};

const COLS: &str = "id, source_path, destination_path, external_id, media_kind,
    confidence, status, error, duration_ms, size_bytes, created_at";

/// Fields of a new history row; the id and timestamp are assigned here.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub source_path: &'a str,
    pub destination_path: Option<&'a str>,
    pub external_id: i64,
    pub media_kind: &'a str,
    pub confidence: f64,
    pub status: HistoryStatus,
    pub error: Option<&'a str>,
    pub duration_ms: i64,
    pub size_bytes: i64,
}

/// Append an immutable history record.
pub fn add_record(conn: &Connection, record: NewRecord<'_>) -> Result<HistoryRecord> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO history (id, source_path, destination_path, external_id, media_kind,
            confidence, status, error, duration_ms, size_bytes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            id,
            record.source_path,
            record.destination_path,
            record.external_id,
            record.media_kind,
            record.confidence,
            record.status.as_str(),
            record.error,
            record.duration_ms,
            record.size_bytes,
            &now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(HistoryRecord {
        id,
        source_path: record.source_path.to_string(),
        destination_path: record.destination_path.map(String::from),
        external_id: record.external_id,
        media_kind: record.media_kind.to_string(),
        confidence: record.confidence,
        status: record.status,
        error: record.error.map(String::from),
        duration_ms: record.duration_ms,
        size_bytes: record.size_bytes,
        created_at: now,
    })
}

/// Whether content with this external id was already successfully ingested.
pub fn is_duplicate(conn: &Connection, external_id: i64) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM history WHERE external_id = ?1 AND status = 'success'",
            [external_id],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count > 0)
}

/// Whether any history row exists for a source path.
pub fn any_for_path(conn: &Connection, source_path: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM history WHERE source_path = ?1",
            [source_path],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count > 0)
}

/// List history rows, optionally filtered by status, newest first.
pub fn list(
    conn: &Connection,
    status: Option<HistoryStatus>,
    limit: i64,
) -> Result<Vec<HistoryRecord>> {
    match status {
        Some(s) => {
            let q = format!(
                "SELECT {COLS} FROM history WHERE status = ?1
                 ORDER BY created_at DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![s.as_str(), limit], HistoryRecord::from_row)
                .map_err(|e| Error::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e.to_string()))?;
            Ok(rows)
        }
        None => {
            let q = format!("SELECT {COLS} FROM history ORDER BY created_at DESC LIMIT ?1");
            let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![limit], HistoryRecord::from_row)
                .map_err(|e| Error::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::database(e.to_string()))?;
            Ok(rows)
        }
    }
}

/// Aggregate ingest statistics.
pub fn stats(conn: &Connection) -> Result<IngestStats> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'success' THEN size_bytes ELSE 0 END), 0)
         FROM history",
        [],
        |row| {
            Ok(IngestStats {
                total: row.get(0)?,
                successes: row.get(1)?,
                failures: row.get(2)?,
                bytes_ingested: row.get(3)?,
            })
        },
    )
    .map_err(|e| Error::database(e.to_string()))
}
