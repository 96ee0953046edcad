//! Compiled carving rules: wildcard/regex needle matching, size bounds, and
//! pairing policy.

pub mod error;
pub mod escapes;
pub mod needle;
pub mod rule;
pub mod ruleset;

pub use error::{Result, RulesError};
pub use needle::{LiteralNeedle, Needle, DEFAULT_WILDCARD, MAX_LITERAL_LENGTH, REGEX_OVERLAP_MARGIN};
pub use rule::{PairingPolicy, Rule};
pub use ruleset::{RuleSet, MAX_RULES};
