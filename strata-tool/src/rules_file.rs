//! Minimal line-oriented rules-file loader.
//!
//! Parsing plain-text rule definitions into a compiled `RuleSet` is a
//! CLI-front-end concern, not something `strata-engine` itself needs to know
//! about, so it lives here instead. Grammar:
//!
//! ```text
//! suffix  (y|n)  [min:]max  header  footer  [FORWARD|NEXT|REVERSE]
//! wildcard C
//! ```
//!
//! One rule per non-blank, non-`#` line. `header`/`footer` delimited by
//! `/.../` compile as regexes; anything else is a literal pattern run
//! through `strata_rules::escapes::decode_pattern`. `NONE` as the suffix
//! means "no file extension." An empty footer token (`-` or an empty
//! `/.../`) means "no footer defined."

use std::fs;
use std::path::Path;

use strata_rules::{escapes, Needle, PairingPolicy, Rule, RuleSet, RulesError, DEFAULT_WILDCARD};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("line {line}: {source}")]
    Rule {
        #[source]
        source: RulesError,
        line: usize,
    },
}

/// Parse a rules file into a compiled [`RuleSet`].
pub fn load(path: impl AsRef<Path>) -> Result<RuleSet, LoadError> {
    let text = fs::read_to_string(path)?;
    let mut wildcard = DEFAULT_WILDCARD;
    let mut rules = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap();
        if first.eq_ignore_ascii_case("wildcard") {
            let ch = tokens.next().ok_or_else(|| LoadError::Malformed {
                line: line_no,
                message: "wildcard directive needs a character".into(),
            })?;
            wildcard = parse_wildcard_char(ch).ok_or_else(|| LoadError::Malformed {
                line: line_no,
                message: format!("invalid wildcard character {ch:?}"),
            })?;
            continue;
        }

        let rule = parse_rule_line(first, tokens, wildcard, line_no)?;
        rules.push(rule);
    }

    RuleSet::new(rules, wildcard).map_err(|source| LoadError::Rule {
        source,
        line: text.lines().count(),
    })
}

fn parse_wildcard_char(tok: &str) -> Option<u8> {
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("\\x")) {
        return u8::from_str_radix(hex, 16).ok();
    }
    let bytes = escapes::decode_pattern(tok).ok()?;
    if bytes.len() == 1 {
        Some(bytes[0])
    } else {
        None
    }
}

fn parse_rule_line<'a>(
    suffix_tok: &'a str,
    mut tokens: impl Iterator<Item = &'a str>,
    wildcard: u8,
    line_no: usize,
) -> Result<Rule, LoadError> {
    let err = |message: String| LoadError::Malformed { line: line_no, message };

    let suffix = if suffix_tok.eq_ignore_ascii_case("NONE") {
        None
    } else {
        Some(suffix_tok.to_string())
    };

    let case_tok = tokens.next().ok_or_else(|| err("missing case-sensitivity column".into()))?;
    let case_sensitive = match case_tok {
        "y" | "Y" => true,
        "n" | "N" => false,
        other => return Err(err(format!("expected y/n for case-sensitivity, got {other:?}"))),
    };

    let size_tok = tokens.next().ok_or_else(|| err("missing size column".into()))?;
    let (min_length, max_length) = parse_size(size_tok).ok_or_else(|| err(format!("malformed size {size_tok:?}")))?;

    let header_tok = tokens.next().ok_or_else(|| err("missing header pattern".into()))?;
    let header = parse_pattern(header_tok, case_sensitive, wildcard).map_err(|e| err(e))?;

    let footer_tok = tokens.next();
    let footer = match footer_tok {
        None | Some("-") => None,
        Some(tok) if tok == "//" => None,
        Some(tok) => Some(parse_pattern(tok, case_sensitive, wildcard).map_err(|e| err(e))?),
    };

    let pairing = match tokens.next() {
        None => PairingPolicy::Forward,
        Some(tok) if tok.eq_ignore_ascii_case("FORWARD") => PairingPolicy::Forward,
        Some(tok) if tok.eq_ignore_ascii_case("NEXT") => PairingPolicy::ForwardNext,
        Some(tok) if tok.eq_ignore_ascii_case("REVERSE") => PairingPolicy::Reverse,
        Some(other) => return Err(err(format!("unknown pairing mode {other:?}"))),
    };

    Rule::new(suffix, case_sensitive, min_length, max_length, header, footer, pairing)
        .map_err(|source| LoadError::Rule { source, line: line_no })
}

fn parse_size(tok: &str) -> Option<(u64, u64)> {
    match tok.split_once(':') {
        Some((min, max)) => Some((min.parse().ok()?, max.parse().ok()?)),
        None => Some((0, tok.parse().ok()?)),
    }
}

fn parse_pattern(tok: &str, case_sensitive: bool, wildcard: u8) -> Result<Needle, String> {
    if let Some(body) = tok.strip_prefix('/').and_then(|s| s.strip_suffix('/')) {
        Needle::regex(body, case_sensitive).map_err(|e| e.to_string())
    } else {
        let bytes = escapes::decode_pattern(tok).map_err(|e| e.to_string())?;
        Needle::literal(bytes, case_sensitive, wildcard).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_rules(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn loads_a_simple_jpeg_rule() {
        let f = write_rules("jpg y 100000 \\xff\\xd8\\xff\\xe0 \\xff\\xd9 FORWARD\n");
        let rules = load(f.path()).unwrap();
        assert_eq!(rules.len(), 1);
        let rule = rules.get(0).unwrap();
        assert_eq!(rule.suffix.as_deref(), Some("jpg"));
        assert_eq!(rule.max_length, 100_000);
    }

    #[test]
    fn none_suffix_means_no_extension() {
        let f = write_rules("NONE y 1000 AB\n");
        let rules = load(f.path()).unwrap();
        assert!(rules.get(0).unwrap().suffix.is_none());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let f = write_rules("# a comment\n\njpg y 1000 AB\n");
        let rules = load(f.path()).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn wildcard_directive_changes_global_wildcard() {
        let f = write_rules("wildcard ?\njpg y 1000 A?C\n");
        let rules = load(f.path()).unwrap();
        assert_eq!(rules.wildcard(), b'?');
    }

    #[test]
    fn min_max_size_column_is_parsed() {
        let f = write_rules("jpg y 10:1000 AB\n");
        let rules = load(f.path()).unwrap();
        let rule = rules.get(0).unwrap();
        assert_eq!(rule.min_length, 10);
        assert_eq!(rule.max_length, 1000);
    }

    #[test]
    fn regex_pattern_delimited_by_slashes() {
        let f = write_rules("pdf y 1000 /%PDF-1\\.[0-9]/\n");
        let rules = load(f.path()).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn missing_footer_defaults_to_none() {
        let f = write_rules("jpg y 1000 AB -\n");
        let rules = load(f.path()).unwrap();
        assert!(rules.get(0).unwrap().footer.is_none());
    }
}
