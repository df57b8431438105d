//! Error types for the snapshot store

use thiserror::Error;

/// Snapshot store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cluster not initialized (no database at {path}). Run init first.")]
    NotInitialized { path: String },

    #[error("Invalid timestamp '{value}' in column {column}")]
    InvalidTimestamp { column: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
