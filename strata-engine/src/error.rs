use thiserror::Error;

/// Top-level error taxonomy: config/init failures, input failures, output
/// failures, resource exhaustion, cancellation, and internal invariant
/// violations. Propagation policy (which of these are fatal to a batch item
/// vs. the whole run) lives with the callers in `carve`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] strata_io::IoError),

    /// Plain `std::io::Error` from output-side file operations (audit log,
    /// carved-file, header/footer database) that don't go through an
    /// `InputReader`.
    #[error("I/O error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("rule error: {0}")]
    Rules(#[from] strata_rules::RulesError),

    #[error("coverage map error: {0}")]
    Coverage(#[from] strata_coverage::CoverageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("input error on {input}: {message}")]
    Input { input: String, message: String },

    #[error("output error: {0}")]
    Output(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("carving cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
