//! Error types for rule compilation.

use thiserror::Error;

/// Errors that can occur while compiling a [`crate::Rule`] or [`crate::RuleSet`].
#[derive(Error, Debug)]
pub enum RulesError {
    /// A literal pattern exceeds the fixed maximum length (20 bytes).
    #[error("literal pattern exceeds {max} bytes: got {len}")]
    PatternTooLong { len: usize, max: usize },

    /// `min_length` exceeds `max_length`.
    #[error("min_length ({min}) exceeds max_length ({max})")]
    MinExceedsMax { min: u64, max: u64 },

    /// Regex failed to compile at load time.
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule's footer is empty but its pairing policy is not `Forward`.
    #[error("rule has no footer but pairing is not Forward")]
    EmptyFooterRequiresForward,

    /// The rule set exceeds the maximum number of distinct rules.
    #[error("too many rules: {count} exceeds the limit of {limit}")]
    TooManyRules { count: usize, limit: usize },

    /// A malformed escape sequence in a literal pattern's text form.
    #[error("invalid escape sequence in pattern: {0:?}")]
    InvalidEscape(String),

    /// I/O error reading/writing a header/footer database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header/footer database file.
    #[error("malformed header/footer database: {0}")]
    MalformedDatabase(String),
}

/// Result type alias for `strata-rules` operations.
pub type Result<T> = std::result::Result<T, RulesError>;
