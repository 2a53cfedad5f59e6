//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`. Guess and candidate payloads are stored as JSON text
//! columns so a queued decision can be replayed without re-querying the
//! metadata provider.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::guess::Guess;
use crate::matcher::MatchResult;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn parse_json<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_enum<T: std::str::FromStr>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ---------------------------------------------------------------------------
// QueueItem
// ---------------------------------------------------------------------------

/// Review status of a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Approved,
    Rejected,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Approved => "approved",
            QueueStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = std::io::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown queue status: {other}"),
            )),
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable record of a path awaiting (or past) manual decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub source_path: String,
    pub guess: Guess,
    /// Candidates ordered by confidence descending.
    pub candidates: Vec<MatchResult>,
    /// Confidence of the top candidate at enqueue time.
    pub confidence: f64,
    /// Human-readable diagnosis of why the file was queued.
    pub reason: Option<String>,
    pub status: QueueStatus,
    pub enqueued_at: String,
    pub decided_at: Option<String>,
}

impl QueueItem {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_path: row.get(1)?,
            guess: parse_json(row, 2)?,
            candidates: parse_json(row, 3)?,
            confidence: row.get(4)?,
            reason: row.get(5)?,
            status: parse_enum(row, 6)?,
            enqueued_at: row.get(7)?,
            decided_at: row.get(8)?,
        })
    }
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// Terminal outcome of an ingest execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Success => "success",
            HistoryStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for HistoryStatus {
    type Err = std::io::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown history status: {other}"),
            )),
        }
    }
}

impl std::fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit row for one ingest attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub source_path: String,
    pub destination_path: Option<String>,
    pub external_id: i64,
    pub media_kind: String,
    pub confidence: f64,
    pub status: HistoryStatus,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub size_bytes: i64,
    pub created_at: String,
}

impl HistoryRecord {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_path: row.get(1)?,
            destination_path: row.get(2)?,
            external_id: row.get(3)?,
            media_kind: row.get(4)?,
            confidence: row.get(5)?,
            status: parse_enum(row, 6)?,
            error: row.get(7)?,
            duration_ms: row.get(8)?,
            size_bytes: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

/// Aggregate counters derived from history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub total: i64,
    pub successes: i64,
    pub failures: i64,
    pub bytes_ingested: i64,
}

impl IngestStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total as f64 * 100.0
    }
}
