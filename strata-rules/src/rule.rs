//! `Rule` — an immutable, compiled file signature: header/footer needles,
//! size bounds, and the pairing policy used to reconcile them.

use crate::error::{Result, RulesError};
use crate::needle::Needle;

/// How a rule's footer offsets are reconciled with its header offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Stop at the first footer after the header; footer bytes included.
    /// Carve without a footer only if explicitly enabled.
    Forward,
    /// Like `Forward`, but the footer itself is excluded from the carve and
    /// a missing footer still produces a max-length truncated carve.
    ForwardNext,
    /// Stop at the farthest footer within `max_length` of the header;
    /// footer bytes included.
    Reverse,
}

/// A compiled, immutable carving rule.
pub struct Rule {
    pub suffix: Option<String>,
    pub case_sensitive: bool,
    pub min_length: u64,
    pub max_length: u64,
    pub header: Needle,
    pub footer: Option<Needle>,
    pub pairing: PairingPolicy,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        suffix: Option<String>,
        case_sensitive: bool,
        min_length: u64,
        max_length: u64,
        header: Needle,
        footer: Option<Needle>,
        pairing: PairingPolicy,
    ) -> Result<Self> {
        if min_length > max_length {
            return Err(RulesError::MinExceedsMax {
                min: min_length,
                max: max_length,
            });
        }

        let footer_is_empty = match &footer {
            None => true,
            Some(f) => f.is_empty(),
        };
        if footer_is_empty && pairing != PairingPolicy::Forward {
            return Err(RulesError::EmptyFooterRequiresForward);
        }

        // An empty footer behaves identically to "no footer defined".
        let footer = if footer_is_empty { None } else { footer };

        Ok(Rule {
            suffix,
            case_sensitive,
            min_length,
            max_length,
            header,
            footer,
            pairing,
        })
    }

    /// Effective needle length used when sizing the dig reader's overlap,
    /// i.e. the larger of the header's and footer's overlap lengths.
    pub fn longest_needle(&self) -> usize {
        let header_len = self.header.overlap_length();
        let footer_len = self.footer.as_ref().map_or(0, |f| f.overlap_length());
        header_len.max(footer_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(bytes: &[u8]) -> Needle {
        Needle::literal(bytes.to_vec(), true, b'?').unwrap()
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let r = Rule::new(
            Some("jpg".into()),
            true,
            100,
            50,
            literal(b"AB"),
            None,
            PairingPolicy::Forward,
        );
        assert!(matches!(r, Err(RulesError::MinExceedsMax { .. })));
    }

    #[test]
    fn empty_footer_requires_forward() {
        let r = Rule::new(
            Some("jpg".into()),
            true,
            0,
            100,
            literal(b"AB"),
            None,
            PairingPolicy::Reverse,
        );
        assert!(matches!(r, Err(RulesError::EmptyFooterRequiresForward)));
    }

    #[test]
    fn zero_length_footer_normalizes_to_none() {
        let zero_len_footer = Needle::literal(vec![], true, b'?');
        assert!(zero_len_footer.is_err(), "empty literal patterns are rejected at construction");
    }
}
