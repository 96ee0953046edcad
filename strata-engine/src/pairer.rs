//! `Pairer` — reconciles per-rule header/footer offset lists into concrete
//! carve `Extent`s, then assigns each extent its deterministic output name.

use std::path::PathBuf;

use log::debug;
use strata_rules::{PairingPolicy, Rule, RuleSet};

use crate::extent::Extent;
use crate::offset::{MatchOffset, RuleOffsets};

/// Knobs that change pairing behavior but not the per-rule data itself.
#[derive(Debug, Clone)]
pub struct PairOptions {
    /// For `Forward` (and `Reverse`), emit a max-length truncated carve when
    /// no footer is found within `max_length` instead of discarding the
    /// header. `ForwardNext` always truncates regardless of this flag.
    pub carve_without_footer: bool,
    /// Replace the simple footer-advance with a balanced nested-match walk.
    pub embedded_aware: bool,
    /// Reject any header whose position is not a multiple of this cluster
    /// size. `None`/`Some(0)` disables the filter.
    pub cluster_size: Option<u64>,
}

impl Default for PairOptions {
    fn default() -> Self {
        PairOptions {
            carve_without_footer: false,
            embedded_aware: false,
            cluster_size: None,
        }
    }
}

/// Output-naming knobs, applied once per-rule extents have been formed.
#[derive(Debug, Clone)]
pub struct NamingOptions {
    pub output_dir: PathBuf,
    /// Subdirectory rollover cap, mirroring `organizeMaxFilesPerSub`. Zero
    /// disables rollover (every carve of a rule lands in subdirectory 0).
    pub max_files_per_subdir: u32,
    pub suppress_suffix: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        NamingOptions {
            output_dir: PathBuf::from("."),
            max_files_per_subdir: 1000,
            suppress_suffix: false,
        }
    }
}

/// Reconciles offset lists into extents and names them. Stateless; all
/// state needed for a run lives in the arguments.
pub struct Pairer;

impl Pairer {
    /// Pair every rule's offsets independently, then assign output names in
    /// rule-firing order so the global counter is deterministic.
    pub fn pair_all(
        rules: &RuleSet,
        offsets: &[RuleOffsets],
        options: &PairOptions,
        naming: &NamingOptions,
        image_size: u64,
    ) -> Vec<Extent> {
        let mut all = Vec::new();
        for (rule_id, rule) in rules.iter_indexed() {
            let per_rule = offsets.get(rule_id).expect("offsets indexed by rule id");
            let before = all.len();
            all.extend(pair_rule(rule, rule_id, per_rule, options, image_size));
            debug!(
                "pairer: rule {rule_id} ({:?}) produced {} extent(s) from {} header(s)/{} footer(s)",
                rule.pairing,
                all.len() - before,
                per_rule.headers.len(),
                per_rule.footers.len()
            );
        }
        name_extents(&mut all, rules, naming);
        all
    }
}

/// Pair a single rule's headers and footers into extents (unnamed).
pub fn pair_rule(
    rule: &Rule,
    rule_id: usize,
    offsets: &RuleOffsets,
    options: &PairOptions,
    image_size: u64,
) -> Vec<Extent> {
    let raw = match &rule.footer {
        None => offsets
            .headers
            .iter()
            .map(|h| truncated_extent(rule_id, h, rule.max_length))
            .collect(),
        Some(_) => pair_with_footer(rule, rule_id, offsets, options),
    };
    filter(raw, rule, options, image_size)
}

fn truncated_extent(rule_id: usize, header: &MatchOffset, max_length: u64) -> Extent {
    Extent {
        rule_id,
        start: header.position,
        stop: header.position + max_length - 1,
        truncated: true,
        output_name: String::new(),
    }
}

fn pair_with_footer(
    rule: &Rule,
    rule_id: usize,
    offsets: &RuleOffsets,
    options: &PairOptions,
) -> Vec<Extent> {
    let headers = &offsets.headers;
    let footers = &offsets.footers;
    let mut extents = Vec::with_capacity(headers.len());
    let mut p = 0usize;

    for (i, header) in headers.iter().enumerate() {
        while p < footers.len() && footers[p].position <= header.position {
            p += 1;
        }

        let found = if options.embedded_aware {
            balanced_match(headers, i + 1, footers, p, header.position, rule.max_length)
        } else {
            match rule.pairing {
                PairingPolicy::Reverse => reverse_match(footers, p, header.position, rule.max_length),
                PairingPolicy::Forward | PairingPolicy::ForwardNext => {
                    forward_match(footers, p, header.position, rule.max_length)
                }
            }
        };

        match found {
            Some(footer_idx) => {
                let footer = &footers[footer_idx];
                let stop = if rule.pairing == PairingPolicy::ForwardNext {
                    footer.position.saturating_sub(1)
                } else {
                    footer.position + footer.matched_length as u64 - 1
                };
                extents.push(Extent {
                    rule_id,
                    start: header.position,
                    stop,
                    truncated: false,
                    output_name: String::new(),
                });
            }
            None => {
                // ForwardNext always truncates to max_length; embedded-aware
                // discards unconditionally; otherwise honor the flag.
                let forced_truncate =
                    !options.embedded_aware && rule.pairing == PairingPolicy::ForwardNext;
                if forced_truncate || (!options.embedded_aware && options.carve_without_footer) {
                    extents.push(truncated_extent(rule_id, header, rule.max_length));
                }
            }
        }
    }

    extents
}

/// First footer at or after the running pointer within `max_length` of the
/// header. Used by `Forward` and `ForwardNext`.
fn forward_match(footers: &[MatchOffset], p: usize, header_pos: u64, max_length: u64) -> Option<usize> {
    let footer = footers.get(p)?;
    if footer.position - header_pos <= max_length {
        Some(p)
    } else {
        None
    }
}

/// The farthest footer reachable from the running pointer while still
/// within `max_length` of the header. Used by `Reverse`.
fn reverse_match(footers: &[MatchOffset], mut p: usize, header_pos: u64, max_length: u64) -> Option<usize> {
    match footers.get(p) {
        Some(f) if f.position - header_pos <= max_length => {}
        _ => return None,
    }
    let mut best = p;
    while let Some(f) = footers.get(p) {
        if f.position - header_pos > max_length {
            break;
        }
        best = p;
        p += 1;
    }
    Some(best)
}

/// Balanced nested-match walk: interleave the headers after this one with
/// the footers at or after the running pointer, in position order, treating
/// a later header of the same rule as opening a nested instance. Returns
/// the footer index where the depth counter returns to zero, or `None` if
/// it never does (or would only do so past `max_length`).
fn balanced_match(
    headers: &[MatchOffset],
    mut next_header: usize,
    footers: &[MatchOffset],
    mut next_footer: usize,
    header_pos: u64,
    max_length: u64,
) -> Option<usize> {
    let mut depth: i64 = 1;
    loop {
        let footer = footers.get(next_footer)?;
        let header = headers.get(next_header);

        let header_comes_first = header.is_some_and(|h| h.position < footer.position);
        if header_comes_first {
            let h = header.unwrap();
            if h.position - header_pos >= max_length {
                return None;
            }
            depth += 1;
            next_header += 1;
        } else {
            if footer.position - header_pos >= max_length {
                return None;
            }
            depth -= 1;
            if depth == 0 {
                return Some(next_footer);
            }
            next_footer += 1;
        }
    }
}

fn filter(mut extents: Vec<Extent>, rule: &Rule, options: &PairOptions, image_size: u64) -> Vec<Extent> {
    extents.retain_mut(|e| {
        if let Some(cluster) = options.cluster_size {
            if cluster > 1 && e.start % cluster != 0 {
                return false;
            }
        }
        if image_size > 0 {
            e.stop = e.stop.min(image_size - 1);
        }
        if e.stop < e.start {
            return false;
        }
        e.stop - e.start + 1 >= rule.min_length
    });
    extents
}

/// Assign deterministic output names in the order extents were produced
/// (rule order, then header order within a rule), mirroring
/// `organizeMaxFilesPerSub`'s per-rule subdirectory rollover.
fn name_extents(extents: &mut [Extent], rules: &RuleSet, naming: &NamingOptions) {
    let mut global_counter: u64 = 0;
    let mut dir_state = vec![(0u32, 0u32); rules.len()]; // (files_in_dir, dir_ordinal)

    for extent in extents.iter_mut() {
        let rule = rules.get(extent.rule_id).expect("extent rule id in bounds");
        let (files_in_dir, dir_ordinal) = &mut dir_state[extent.rule_id];

        if naming.max_files_per_subdir > 0 && *files_in_dir >= naming.max_files_per_subdir {
            *dir_ordinal += 1;
            *files_in_dir = 0;
        }

        let suffix = rule.suffix.as_deref().filter(|_| !naming.suppress_suffix);
        let subdir = match &rule.suffix {
            Some(s) => format!("{s}-{}-{}", extent.rule_id, dir_ordinal),
            None => format!("unk-{}-{}", extent.rule_id, dir_ordinal),
        };
        let ext = suffix.map(|s| format!(".{s}")).unwrap_or_default();

        extent.output_name = format!(
            "{}/{subdir}/{global_counter:08}{ext}",
            naming.output_dir.display()
        );

        global_counter += 1;
        *files_in_dir += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_rules::Needle;

    fn rule(max_length: u64, pairing: PairingPolicy) -> Rule {
        let header = Needle::literal(b"HEAD".to_vec(), true, b'?').unwrap();
        let footer = Needle::literal(b"TAIL".to_vec(), true, b'?').unwrap();
        Rule::new(Some("bin".into()), true, 0, max_length, header, Some(footer), pairing).unwrap()
    }

    fn offset(rule_id: usize, position: u64, matched_length: usize) -> MatchOffset {
        MatchOffset {
            rule_id,
            position,
            matched_length,
        }
    }

    #[test]
    fn forward_basic_single_header_footer() {
        let r = rule(100_000, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4)],
            footers: vec![offset(0, 508, 2)],
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 512);
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0], Extent { rule_id: 0, start: 0, stop: 509, truncated: false, output_name: String::new() });
    }

    #[test]
    fn reverse_mode_pairs_two_overlapping_headers_to_the_farthest_footer() {
        let r = rule(30_000, PairingPolicy::Reverse);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4), offset(0, 10, 4)],
            footers: vec![offset(0, 500, 3), offset(0, 20_000, 3)],
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 1_000_000);
        assert_eq!(extents.len(), 2);
        assert_eq!(extents[0].stop, 20_000 + 3 - 1);
        assert_eq!(extents[1].stop, 20_000 + 3 - 1);
    }

    #[test]
    fn embedded_zip_in_zip_counter_walk() {
        let r = rule(100_000, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4), offset(0, 100, 4)],
            footers: vec![offset(0, 200, 3), offset(0, 400, 3)],
        };
        let options = PairOptions { embedded_aware: true, ..PairOptions::default() };
        let extents = pair_rule(&r, 0, &offsets, &options, 1_000_000);
        assert_eq!(extents.len(), 2);
        assert_eq!(extents[0].stop, 400 + 3 - 1);
        // the nested header's own carve closes at the first footer after it
        assert_eq!(extents[1].stop, 200 + 3 - 1);
    }

    #[test]
    fn embedded_without_viable_footer_discards_header() {
        let r = rule(1_000, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4), offset(0, 10, 4)],
            footers: vec![],
        };
        let options = PairOptions { embedded_aware: true, ..PairOptions::default() };
        let extents = pair_rule(&r, 0, &offsets, &options, 1_000_000);
        assert!(extents.is_empty());
    }

    #[test]
    fn forward_next_always_truncates_on_missing_footer() {
        let r = rule(1024, PairingPolicy::ForwardNext);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 50, 4)],
            footers: vec![],
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 1_000_000);
        assert_eq!(extents.len(), 1);
        assert!(extents[0].truncated);
        assert_eq!(extents[0].stop, 50 + 1024 - 1);
    }

    #[test]
    fn forward_basic_without_carve_without_footer_discards_header() {
        let r = rule(1024, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 50, 4)],
            footers: vec![],
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 1_000_000);
        assert!(extents.is_empty());
    }

    #[test]
    fn carve_without_footer_enables_truncated_forward_basic() {
        let r = rule(1024, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 50, 4)],
            footers: vec![],
        };
        let options = PairOptions { carve_without_footer: true, ..PairOptions::default() };
        let extents = pair_rule(&r, 0, &offsets, &options, 1_000_000);
        assert_eq!(extents.len(), 1);
        assert!(extents[0].truncated);
    }

    #[test]
    fn footer_exactly_at_max_length_boundary_is_not_truncated() {
        let r = rule(100, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4)],
            footers: vec![offset(0, 97, 3)], // stop = 99 = start + max_length - 1
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 1_000);
        assert_eq!(extents.len(), 1);
        assert!(!extents[0].truncated);
        assert_eq!(extents[0].stop, 99);
    }

    #[test]
    fn no_footer_defined_rule_always_truncates() {
        let header = Needle::literal(b"HEAD".to_vec(), true, b'?').unwrap();
        let r = Rule::new(Some("bin".into()), true, 0, 256, header, None, PairingPolicy::Forward).unwrap();
        let offsets = RuleOffsets {
            headers: vec![offset(0, 5, 4)],
            footers: vec![],
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 10_000);
        assert_eq!(extents.len(), 1);
        assert!(extents[0].truncated);
        assert_eq!(extents[0].stop, 5 + 256 - 1);
    }

    #[test]
    fn min_length_filter_drops_short_extents() {
        let header = Needle::literal(b"HEAD".to_vec(), true, b'?').unwrap();
        let footer = Needle::literal(b"TAIL".to_vec(), true, b'?').unwrap();
        let r = Rule::new(Some("bin".into()), true, 50, 1000, header, Some(footer), PairingPolicy::Forward).unwrap();
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4)],
            footers: vec![offset(0, 10, 3)], // total length 13 < min_length 50
        };
        let extents = pair_rule(&r, 0, &offsets, &PairOptions::default(), 10_000);
        assert!(extents.is_empty());
    }

    #[test]
    fn block_alignment_filter_rejects_unaligned_header() {
        let r = rule(1000, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4), offset(0, 5, 4)],
            footers: vec![offset(0, 20, 3), offset(0, 30, 3)],
        };
        let options = PairOptions { cluster_size: Some(4), ..PairOptions::default() };
        let extents = pair_rule(&r, 0, &offsets, &options, 10_000);
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0].start, 0);
    }

    #[test]
    fn stop_is_clipped_to_image_size() {
        let r = rule(1_000_000, PairingPolicy::Forward);
        let offsets = RuleOffsets {
            headers: vec![offset(0, 0, 4)],
            footers: vec![],
        };
        let options = PairOptions { carve_without_footer: true, ..PairOptions::default() };
        let extents = pair_rule(&r, 0, &offsets, &options, 100);
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0].stop, 99);
    }

    #[test]
    fn naming_rolls_subdirectory_over_after_cap() {
        let rules = RuleSet::new(vec![rule(1000, PairingPolicy::Forward)], b'?').unwrap();
        let mut extents = vec![
            Extent { rule_id: 0, start: 0, stop: 9, truncated: false, output_name: String::new() },
            Extent { rule_id: 0, start: 20, stop: 29, truncated: false, output_name: String::new() },
            Extent { rule_id: 0, start: 40, stop: 49, truncated: false, output_name: String::new() },
        ];
        let naming = NamingOptions {
            output_dir: PathBuf::from("/out"),
            max_files_per_subdir: 2,
            suppress_suffix: false,
        };
        name_extents(&mut extents, &rules, &naming);
        assert!(extents[0].output_name.starts_with("/out/bin-0-0/"));
        assert!(extents[1].output_name.starts_with("/out/bin-0-0/"));
        assert!(extents[2].output_name.starts_with("/out/bin-0-1/"));
    }
}
