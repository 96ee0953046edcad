//! Error type for coverage blockmap setup and persistence.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("I/O error on coverage blockmap: {0}")]
    Io(#[from] std::io::Error),

    #[error("coverage blockmap {path} has block size {found}, expected {expected}")]
    BlockSizeMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("coverage blockmap {0} does not exist and updates are disabled")]
    MissingBlockmap(PathBuf),

    #[error("coverage blockmap {0} is truncated")]
    Truncated(PathBuf),
}

pub type Result<T> = std::result::Result<T, CoverageError>;
