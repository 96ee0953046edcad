//! Per-block coverage tracking for multi-pass carving: a persistent carve
//! count per block, an in-core bitmap derived from it, and the address
//! translation a dig/extract pass needs to skip blocks an earlier pass
//! already consumed.

pub mod error;
pub mod fragment;
pub mod map;

pub use error::{CoverageError, Result};
pub use fragment::Fragment;
pub use map::CoverageMap;
