//! `MatchOffset` — one header or footer hit recorded during the dig pass.

/// A single needle match. `position` is in the reader's logical address
/// space (already translated through the coverage map, if one is active).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOffset {
    pub rule_id: usize,
    pub position: u64,
    pub matched_length: usize,
}

/// Per-rule accumulated header and footer offsets. Both lists are kept
/// monotonically non-decreasing in `position`, relied upon by `Pairer`.
#[derive(Debug, Clone, Default)]
pub struct RuleOffsets {
    pub headers: Vec<MatchOffset>,
    pub footers: Vec<MatchOffset>,
}

impl RuleOffsets {
    pub fn headers_monotonic(&self) -> bool {
        self.headers.windows(2).all(|w| w[0].position <= w[1].position)
    }

    pub fn footers_monotonic(&self) -> bool {
        self.footers.windows(2).all(|w| w[0].position <= w[1].position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_offsets_are_monotonic() {
        let offsets = RuleOffsets::default();
        assert!(offsets.headers_monotonic());
        assert!(offsets.footers_monotonic());
    }
}
