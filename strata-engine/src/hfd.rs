//! Header/footer database (`.hfd`) round-trip: a per-rule block of
//! `<suffix>\n<num_headers>\n<positions...>\n<num_footers>\n<positions...>`.
//!
//! The format only ever records positions, never match lengths — a carve's
//! extent length is recomputed from the rule's own pattern at pairing time.
//! Reading a database back therefore assigns
//! each recovered offset the needle's exact length for literal patterns;
//! regex patterns have no fixed length to recover, so the position is kept
//! but the match length degrades to the regex's overlap margin. That's an
//! inherent limitation of the file format, not of this reader.

use std::io::{BufRead, Write};

use strata_rules::RuleSet;

use crate::error::{Error, Result};
use crate::offset::{MatchOffset, RuleOffsets};

const NO_SUFFIX_SENTINEL: &str = "NONE";

/// Write one block per rule in `rules`' order, so the Nth block always
/// corresponds to `rules.get(N)`.
pub fn write<W: Write>(out: &mut W, rules: &RuleSet, offsets: &[RuleOffsets]) -> Result<()> {
    for (rule_id, rule) in rules.iter_indexed() {
        let per_rule = offsets.get(rule_id).ok_or_else(|| {
            Error::Internal(format!("no offsets recorded for rule {rule_id}"))
        })?;
        let suffix = rule.suffix.as_deref().unwrap_or(NO_SUFFIX_SENTINEL);

        writeln!(out, "{suffix}")?;
        writeln!(out, "{}", per_rule.headers.len())?;
        for h in &per_rule.headers {
            writeln!(out, "{}", h.position)?;
        }
        writeln!(out, "{}", per_rule.footers.len())?;
        for f in &per_rule.footers {
            writeln!(out, "{}", f.position)?;
        }
    }
    Ok(())
}

/// Read a database back into per-rule offset lists, validating that each
/// block's suffix matches the corresponding rule's — a mismatch means the
/// database was generated against a different rule set than the one now in
/// use, which would silently mis-pair offsets if left unchecked.
pub fn read<R: BufRead>(input: &mut R, rules: &RuleSet) -> Result<Vec<RuleOffsets>> {
    let mut lines = input.lines();
    let mut out: Vec<RuleOffsets> = (0..rules.len()).map(|_| RuleOffsets::default()).collect();

    for (rule_id, rule) in rules.iter_indexed() {
        let suffix_line = next_line(&mut lines)?;
        let expected = rule.suffix.as_deref().unwrap_or(NO_SUFFIX_SENTINEL);
        if suffix_line != expected {
            return Err(Error::Config(format!(
                "header/footer database suffix mismatch at rule {rule_id}: expected {expected:?}, found {suffix_line:?}"
            )));
        }

        let header_len = rule.header.nominal_length().unwrap_or(0);
        let num_headers = parse_count(&next_line(&mut lines)?)?;
        for _ in 0..num_headers {
            let position = parse_position(&next_line(&mut lines)?)?;
            out[rule_id].headers.push(MatchOffset {
                rule_id,
                position,
                matched_length: header_len,
            });
        }

        let footer_len = rule.footer.as_ref().and_then(|f| f.nominal_length()).unwrap_or(0);
        let num_footers = parse_count(&next_line(&mut lines)?)?;
        for _ in 0..num_footers {
            let position = parse_position(&next_line(&mut lines)?)?;
            out[rule_id].footers.push(MatchOffset {
                rule_id,
                position,
                matched_length: footer_len,
            });
        }
    }

    Ok(out)
}

fn next_line(lines: &mut std::io::Lines<impl BufRead>) -> Result<String> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(Error::Config("header/footer database truncated".into())),
    }
}

fn parse_count(line: &str) -> Result<usize> {
    line.trim()
        .parse()
        .map_err(|_| Error::Config(format!("malformed count {line:?} in header/footer database")))
}

fn parse_position(line: &str) -> Result<u64> {
    line.trim()
        .parse()
        .map_err(|_| Error::Config(format!("malformed position {line:?} in header/footer database")))
}
