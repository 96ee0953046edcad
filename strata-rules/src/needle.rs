//! `NeedleMatcher` — literal (wildcard-aware, Boyer-Moore) and regex pattern
//! matching over a byte window.

use regex::bytes::Regex;

use crate::error::{Result, RulesError};

/// Maximum literal pattern length, mirroring the original carving engine's
/// fixed-size needle buffers.
pub const MAX_LITERAL_LENGTH: usize = 20;

/// Safety margin bounding how far a regex match can straddle a window
/// boundary; used to size the reader's back-seek overlap.
pub const REGEX_OVERLAP_MARGIN: usize = 1024;

/// Default wildcard byte: `?`.
pub const DEFAULT_WILDCARD: u8 = b'?';

/// A single compiled needle: either a literal byte pattern (with optional
/// wildcard byte and case policy) or a compiled regex.
pub enum Needle {
    Literal(LiteralNeedle),
    Regex(Box<Regex>),
}

/// A literal pattern plus its Boyer-Moore skip table.
pub struct LiteralNeedle {
    pattern: Vec<u8>,
    case_sensitive: bool,
    wildcard: u8,
    skip: [usize; 256],
}

impl LiteralNeedle {
    pub fn new(pattern: Vec<u8>, case_sensitive: bool, wildcard: u8) -> Result<Self> {
        if pattern.is_empty() {
            return Err(RulesError::PatternTooLong {
                len: 0,
                max: MAX_LITERAL_LENGTH,
            });
        }
        if pattern.len() > MAX_LITERAL_LENGTH {
            return Err(RulesError::PatternTooLong {
                len: pattern.len(),
                max: MAX_LITERAL_LENGTH,
            });
        }
        let skip = build_skip_table(&pattern, case_sensitive, wildcard);
        Ok(LiteralNeedle {
            pattern,
            case_sensitive,
            wildcard,
            skip,
        })
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    fn char_matches(&self, needle_byte: u8, hay_byte: u8) -> bool {
        characters_match(needle_byte, hay_byte, self.case_sensitive, self.wildcard)
    }

    fn matches_at(&self, haystack: &[u8], pos: usize) -> bool {
        let n = self.pattern.len();
        if pos + n > haystack.len() {
            return false;
        }
        for i in 0..n {
            if !self.char_matches(self.pattern[i], haystack[pos + i]) {
                return false;
            }
        }
        true
    }

    /// Boyer-Moore style scan for every occurrence of this pattern in
    /// `haystack`, starting no earlier than `start_offset`. When
    /// `allow_overlap` is false, a match advances past its full length;
    /// otherwise the scan only advances by one byte.
    pub fn find_all(&self, haystack: &[u8], start_offset: usize, allow_overlap: bool) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let n = self.pattern.len();
        if haystack.len() < n {
            return out;
        }

        let mut pos = start_offset + n - 1;
        while pos < haystack.len() {
            let shift = self.skip[haystack[pos] as usize];
            if shift > 0 {
                pos += shift;
                continue;
            }
            let candidate = pos + 1 - n;
            if self.matches_at(haystack, candidate) {
                out.push((candidate, n));
                pos += if allow_overlap { 1 } else { n };
            } else {
                pos += 1;
            }
        }
        out
    }
}

/// `charactersMatch`: a wildcard byte always matches; otherwise ASCII
/// letters compare case-insensitively when requested.
fn characters_match(a: u8, b: u8, case_sensitive: bool, wildcard: u8) -> bool {
    if a == wildcard || a == b {
        return true;
    }
    if case_sensitive {
        return false;
    }
    a.is_ascii_alphabetic() && b.is_ascii_alphabetic() && a.to_ascii_lowercase() == b.to_ascii_lowercase()
}

/// Build the Boyer-Moore "bad character" skip table. A wildcard position
/// collapses every skip that would jump past it down to the distance from
/// that wildcard to the end of the pattern, so a scan can never leap over a
/// byte the pattern would have matched unconditionally.
fn build_skip_table(pattern: &[u8], case_sensitive: bool, wildcard: u8) -> [usize; 256] {
    let len = pattern.len();
    let mut table = [len; 256];

    for (i, &byte) in pattern.iter().enumerate() {
        let distance_from_end = len - i - 1;
        if byte == wildcard {
            for slot in table.iter_mut() {
                *slot = distance_from_end;
            }
        }
        table[byte as usize] = distance_from_end;
        if !case_sensitive && byte.is_ascii_alphabetic() {
            table[byte.to_ascii_lowercase() as usize] = distance_from_end;
            table[byte.to_ascii_uppercase() as usize] = distance_from_end;
        }
    }
    table
}

impl Needle {
    pub fn literal(pattern: Vec<u8>, case_sensitive: bool, wildcard: u8) -> Result<Self> {
        Ok(Needle::Literal(LiteralNeedle::new(
            pattern,
            case_sensitive,
            wildcard,
        )?))
    }

    pub fn regex(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let full_pattern = if case_sensitive {
            pattern.to_string()
        } else {
            format!("(?i){pattern}")
        };
        let re = Regex::new(&full_pattern).map_err(|source| RulesError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Needle::Regex(Box::new(re)))
    }

    /// Effective length used to size the dig reader's overlap re-read:
    /// exact for literals, a fixed safety margin for regexes.
    pub fn overlap_length(&self) -> usize {
        match self {
            Needle::Literal(l) => l.len(),
            Needle::Regex(_) => REGEX_OVERLAP_MARGIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Needle::Literal(l) => l.is_empty(),
            Needle::Regex(_) => false,
        }
    }

    /// The exact length of any match this needle can produce, when that's a
    /// fixed property of the pattern. Literal patterns always match their
    /// own length; a regex's match length varies per occurrence and can't be
    /// recovered from a bare position, which is why the header/footer
    /// database format only ever persists positions.
    pub fn nominal_length(&self) -> Option<usize> {
        match self {
            Needle::Literal(l) => Some(l.len()),
            Needle::Regex(_) => None,
        }
    }

    /// Find all non-overlapping (or overlapping, per `allow_overlap`)
    /// matches in `haystack` at or after `start_offset`.
    pub fn find_all(&self, haystack: &[u8], start_offset: usize, allow_overlap: bool) -> Vec<(usize, usize)> {
        match self {
            Needle::Literal(l) => l.find_all(haystack, start_offset, allow_overlap),
            Needle::Regex(re) => {
                if start_offset >= haystack.len() {
                    return Vec::new();
                }
                let mut out = Vec::new();
                let mut pos = start_offset;
                while pos <= haystack.len() {
                    match re.find_at(haystack, pos) {
                        Some(m) => {
                            let (start, end) = (m.start(), m.end());
                            out.push((start, end - start));
                            pos = if allow_overlap {
                                start + 1
                            } else if end > start {
                                end
                            } else {
                                end + 1
                            };
                        }
                        None => break,
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_find_all_basic() {
        let needle = LiteralNeedle::new(b"AB".to_vec(), true, b'?').unwrap();
        let hay = b"xxABxxAByy";
        let matches = needle.find_all(hay, 0, false);
        assert_eq!(matches, vec![(2, 2), (6, 2)]);
    }

    #[test]
    fn wildcard_matches_any_byte() {
        let needle = LiteralNeedle::new(b"A?C".to_vec(), true, b'?').unwrap();
        let hay = b"xAbCx";
        let matches = needle.find_all(hay, 0, false);
        assert_eq!(matches, vec![(1, 3)]);
    }

    #[test]
    fn wildcard_at_leading_position_is_found() {
        let needle = LiteralNeedle::new(b"?BC".to_vec(), true, b'?').unwrap();
        // every slot collapses to the wildcard's distance from the pattern's
        // end (here 2), not 0 — a leading wildcard still lets the scan skip
        // ahead by that distance on a byte the rest of the pattern rejects.
        assert_eq!(needle.skip[b'z' as usize], 2);
        let hay = b"xxZBCxx";
        let matches = needle.find_all(hay, 0, false);
        assert_eq!(matches, vec![(2, 3)]);
    }

    #[test]
    fn case_insensitive_matches_ascii_letters_only() {
        let needle = LiteralNeedle::new(b"abc".to_vec(), false, b'?').unwrap();
        let hay = b"xxABCxx";
        let matches = needle.find_all(hay, 0, false);
        assert_eq!(matches, vec![(2, 3)]);
    }

    #[test]
    fn overlap_flag_controls_advance() {
        let needle = LiteralNeedle::new(b"AA".to_vec(), true, b'?').unwrap();
        let hay = b"AAAA";
        assert_eq!(needle.find_all(hay, 0, false), vec![(0, 2), (2, 2)]);
        assert_eq!(needle.find_all(hay, 0, true), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn pattern_too_long_rejected() {
        let pattern = vec![b'A'; MAX_LITERAL_LENGTH + 1];
        assert!(matches!(
            LiteralNeedle::new(pattern, true, b'?'),
            Err(RulesError::PatternTooLong { .. })
        ));
    }

    #[test]
    fn regex_find_all_non_overlapping() {
        let needle = Needle::regex("fo+", true).unwrap();
        let matches = needle.find_all(b"fooxfoooy", 0, false);
        assert_eq!(matches, vec![(0, 3), (4, 5)]);
    }

    #[test]
    fn regex_case_insensitive() {
        let needle = Needle::regex("abc", false).unwrap();
        let matches = needle.find_all(b"xxABCxx", 0, false);
        assert_eq!(matches, vec![(2, 3)]);
    }
}
