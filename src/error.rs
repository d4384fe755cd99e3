//! Error types for Memoir

use thiserror::Error;

/// Result type alias for Memoir operations
pub type Result<T> = std::result::Result<T, MemoirError>;

/// Main error type for Memoir
#[derive(Error, Debug)]
pub enum MemoirError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid migration filename: {0}")]
    MigrationFilename(String),

    #[error("Cannot compact an empty chunk list")]
    EmptyCompaction,

    #[error("Chunks not found: {}", .0.join(", "))]
    MissingChunks(Vec<String>),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
