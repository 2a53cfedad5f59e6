//! Durable store: SQLite pool, migrations, models, and query modules.
//!
//! The store is the single source of truth for "has this path or candidate
//! already been handled" -- routing consults it before mutating anything,
//! so a restarted process never double-ingests.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::{HistoryRecord, HistoryStatus, IngestStats, QueueItem, QueueStatus};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
