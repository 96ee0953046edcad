//! `Extent` — a carve candidate in the input's logical address space.

/// A carve candidate: `[start, stop]` inclusive, logical addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub rule_id: usize,
    pub start: u64,
    pub stop: u64,
    pub truncated: bool,
    pub output_name: String,
}

impl Extent {
    pub fn len(&self) -> u64 {
        self.stop - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Which 10-MiB window this extent's start falls in.
    pub fn start_window(&self, window_size: u64) -> u64 {
        self.start / window_size
    }

    pub fn stop_window(&self, window_size: u64) -> u64 {
        self.stop / window_size
    }
}
