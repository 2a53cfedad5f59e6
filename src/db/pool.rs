//! Database connection pool management.
//!
//! SQLite connection pooling via r2d2; pool initialization runs migrations
//! before handing out connections. The store is the single source of truth
//! for routing decisions, so a pool failure is fatal to automatic
//! processing.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::db::migrations;
use crate::error::{Error, Result};

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a new database pool with the given file path.
///
/// Creates the SQLite file if missing, enables foreign keys on every
/// connection, and runs pending migrations.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Initialize an in-memory database pool for testing.
///
/// Uses a single connection so every caller observes the same in-memory
/// database.
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool, converting the r2d2 error into the
/// common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
