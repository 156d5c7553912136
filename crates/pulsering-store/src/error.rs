//! Error types for pulsering-store.

use std::path::PathBuf;

/// Result type for pulsering-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pulsering-store.
///
/// Storage failures are fatal for the operation that hit them; the
/// store never retries internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Timestamp outside the representable calendar range.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// Malformed calendar-day key (expected YYYY-MM-DD).
    #[error("Invalid day key: {0}")]
    InvalidDay(String),

    /// A bulk operation observed a cancellation request and rolled back.
    #[error("Operation cancelled before commit")]
    Cancelled,
}
