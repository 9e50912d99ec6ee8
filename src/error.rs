// ⚠️ Error Taxonomy
// File-level and storage-level failures; row-level problems never become errors

use std::path::PathBuf;

/// Failures surfaced by the import / draw / reset operations
#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    /// CSV path does not exist. Nothing was written.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Persistence layer missing or not initialized. Nothing was written.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage failure (including a failed commit). Whatever the
    /// transaction held has been rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, DrawError>;
