//! Error types for datscan

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for datscan operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Archive root {} is not readable: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid search term: {0}")]
    InvalidTerm(String),
}

/// Result type alias for datscan operations
pub type Result<T> = std::result::Result<T, Error>;
