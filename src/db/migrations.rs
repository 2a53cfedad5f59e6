//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// V1: initial schema -- review queue and ingest history.
const V1_INITIAL: &str = r#"
-- Files awaiting a manual decision. Rows are never deleted, only
-- status-transitioned, so the review trail stays auditable.
CREATE TABLE queue_items (
    id           TEXT PRIMARY KEY,
    source_path  TEXT NOT NULL,
    guess        TEXT NOT NULL,
    candidates   TEXT NOT NULL,
    confidence   REAL NOT NULL,
    reason       TEXT,
    status       TEXT NOT NULL DEFAULT 'pending',
    enqueued_at  TEXT NOT NULL,
    decided_at   TEXT
);

CREATE INDEX idx_queue_items_path_status ON queue_items(source_path, status);
CREATE INDEX idx_queue_items_status ON queue_items(status);

-- Terminal ingest outcomes; immutable once written. Drives the duplicate
-- guard and the audit surface.
CREATE TABLE history (
    id               TEXT PRIMARY KEY,
    source_path      TEXT NOT NULL,
    destination_path TEXT,
    external_id      INTEGER NOT NULL,
    media_kind       TEXT NOT NULL,
    confidence       REAL NOT NULL,
    status           TEXT NOT NULL,
    error            TEXT,
    duration_ms      INTEGER NOT NULL DEFAULT 0,
    size_bytes       INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE INDEX idx_history_external_status ON history(external_id, status);
CREATE INDEX idx_history_source ON history(source_path);
"#;

struct Migration {
    version: usize,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: V1_INITIAL,
}];

fn init_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;
    Ok(())
}

fn current_version(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get::<_, Option<usize>>(0)
    })
    .map(|v| v.unwrap_or(0))
}

/// Run all pending migrations, returning how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    init_migrations_table(conn).map_err(|e| Error::database(e.to_string()))?;

    let version = current_version(conn).map_err(|e| Error::database(e.to_string()))?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        conn.execute_batch(migration.sql).map_err(|e| {
            Error::database(format!("migration {} failed: {}", migration.version, e))
        })?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        applied += 1;
    }

    Ok(applied)
}
