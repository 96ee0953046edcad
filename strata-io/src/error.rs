//! Error types for input-reader and queue operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading or seeking an input source.
#[derive(Error, Debug)]
pub enum IoError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read or seek was attempted before `open()` or after `close()`.
    #[error("input reader is not open")]
    NotOpen,

    /// `size()` could not be determined for this source.
    #[error("size is unmeasurable for input {0:?}")]
    SizeUnavailable(String),
}

/// Result type alias for `strata-io` operations.
pub type Result<T> = std::result::Result<T, IoError>;
