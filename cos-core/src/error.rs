use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CosError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index or chunk file failure while storing.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An index entry whose chunk file is missing, unreadable or corrupt.
    #[error("Storage error: inconsistent index: {0}")]
    Inconsistent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing chunk {index} of file {file_id}")]
    MissingChunk { file_id: String, index: u32 },

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Empty file: {}", .0.display())]
    EmptyFile(PathBuf),
}

impl CosError {
    pub fn storage(msg: impl Into<String>) -> Self {
        CosError::Storage(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CosError::InvalidChunk(msg.into())
    }
}

impl From<libsql::Error> for CosError {
    fn from(e: libsql::Error) -> Self {
        CosError::Storage(format!("index: {e}"))
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, CosError>;
