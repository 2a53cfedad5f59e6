//! Common error types used throughout reelsort.
//!
//! Component-level failures (provider outages, copy failures, stability
//! timeouts) are recovered at their boundary and turned into queue or
//! history state; this type covers the faults that cross module seams,
//! most importantly durable-store failures, which callers must treat as
//! fatal to automatic processing.

/// Common error type for reelsort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A durable-store operation failed. Exactly-once routing cannot be
    /// guaranteed past this point, so automatic processing must halt.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Copying a file into the library failed; the destination has been
    /// rolled back and the source left untouched.
    #[error("Copy failed: {0}")]
    CopyFailed(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new CopyFailed error.
    pub fn copy_failed<S: Into<String>>(msg: S) -> Self {
        Self::CopyFailed(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
