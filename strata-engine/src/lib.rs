//! The carving engine proper: dig the input for header/footer matches, pair
//! them into extents, and extract the resulting carves, with an audit log
//! and optional header/footer database alongside.

pub mod audit;
pub mod carve;
pub mod dig;
pub mod error;
pub mod extent;
pub mod extract;
pub mod hfd;
pub mod offset;
pub mod pairer;

pub use audit::Auditor;
pub use carve::{carve_batch, carve_one, BatchItemResult, CarveOptions, CarveSummary};
pub use dig::{dig, DigOptions, DigOutput, ProgressFn};
pub use error::{Error, Result};
pub use extent::Extent;
pub use extract::{extract, ExtractOptions, ExtractOutput, DEFAULT_MAX_OPEN_FILES};
pub use offset::{MatchOffset, RuleOffsets};
pub use pairer::{pair_rule, NamingOptions, PairOptions, Pairer};

// Re-export the crates this engine is built from, mirroring how the
// workspace's original DMG pipeline re-exported its filesystem crates.
pub use strata_coverage;
pub use strata_io;
pub use strata_rules;
