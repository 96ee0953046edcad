//! `DigEngine` — streaming reader plus parallel searchers that turn an input
//! into per-rule header/footer offset lists.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;

use strata_coverage::CoverageMap;
use strata_io::{BufferPool, InputReader, Whence, DEFAULT_POOL_DEPTH};
use strata_rules::{Rule, RuleSet};

use crate::error::{Error, Result};
use crate::offset::{MatchOffset, RuleOffsets};

pub type ProgressFn = dyn Fn(u64, i64) + Send + Sync;

pub struct DigOptions {
    /// Bytes to skip at the start of the input before digging (`-s`).
    pub skip_bytes: u64,
    /// Whether successive matches of the same needle may overlap.
    pub allow_overlap: bool,
    /// Force every window's footer search regardless of header state, so a
    /// header/footer database can be written for the whole input.
    pub generate_database: bool,
    pub pool_depth: usize,
    pub progress: Option<Box<ProgressFn>>,
}

impl Default for DigOptions {
    fn default() -> Self {
        DigOptions {
            skip_bytes: 0,
            allow_overlap: true,
            generate_database: false,
            pool_depth: DEFAULT_POOL_DEPTH,
            progress: None,
        }
    }
}

pub struct DigOutput {
    /// Indexed by rule id, parallel to the `RuleSet` passed to `dig`.
    pub offsets: Vec<RuleOffsets>,
}

/// Run the dig pass: stream `reader` in 10-MiB windows, searching every rule
/// for headers (and, when viable, footers) in each window.
pub fn dig<R: InputReader>(
    reader: &mut R,
    rules: &RuleSet,
    coverage: &mut CoverageMap,
    options: &DigOptions,
    cancel: &AtomicBool,
) -> Result<DigOutput> {
    reader.open()?;
    if options.skip_bytes > 0 {
        reader.seek(options.skip_bytes as i64, Whence::Set)?;
    }

    let total_size = reader.size();
    let longest_needle = rules.longest_needle().max(1);
    info!(
        "dig: starting {} ({} rules, longest needle {longest_needle} bytes, size {total_size})",
        reader.id(),
        rules.len()
    );
    if total_size >= 0 && (total_size as u64) <= (longest_needle as u64) * 2 {
        warn!("dig: {} too small to dig ({total_size} bytes)", reader.id());
        return Err(Error::Input {
            input: reader.id().to_string(),
            message: format!(
                "input of {total_size} bytes is not larger than twice the longest needle ({})",
                longest_needle * 2
            ),
        });
    }

    let pool = BufferPool::new(options.pool_depth.max(1));
    let mut offsets: Vec<RuleOffsets> = (0..rules.len()).map(|_| RuleOffsets::default()).collect();
    let mut reader_err: Option<Error> = None;

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| {
            reader_loop(
                reader,
                coverage,
                &pool,
                longest_needle,
                options.skip_bytes,
                cancel,
                total_size,
                options.progress.as_deref(),
            )
        });

        let mut first_window = true;
        loop {
            let buf = pool.full.get();
            if buf.is_sentinel() {
                pool.empty.put(buf);
                break;
            }

            let cutoff = if first_window {
                0
            } else {
                longest_needle.saturating_sub(1)
            };
            first_window = false;

            let window_start = buf.begin_position;
            let data = buf.filled();

            offsets.par_iter_mut().enumerate().for_each(|(rule_id, acc)| {
                let rule = rules.get(rule_id).expect("rule index within bounds");
                search_window(
                    rule,
                    rule_id,
                    data,
                    window_start,
                    cutoff,
                    acc,
                    options.allow_overlap,
                    options.generate_database,
                );
            });

            pool.empty.put(buf);

            if cancel.load(Ordering::Relaxed) {
                info!("dig: cancellation observed at window starting {window_start}");
                break;
            }
        }

        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => reader_err = Some(e),
            Err(_) => reader_err = Some(Error::Internal("dig reader thread panicked".into())),
        }
    });

    if let Some(e) = reader_err {
        warn!("dig: reader task for {} failed: {e}", reader.id());
        return Err(e);
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }

    for (rule_id, acc) in offsets.iter().enumerate() {
        debug_assert!(acc.headers_monotonic());
        debug_assert!(acc.footers_monotonic());
        debug!(
            "dig: rule {rule_id} found {} header(s), {} footer(s)",
            acc.headers.len(),
            acc.footers.len()
        );
    }
    info!("dig: finished {}", reader.id());

    Ok(DigOutput { offsets })
}

fn reader_loop<R: InputReader>(
    reader: &mut R,
    coverage: &mut CoverageMap,
    pool: &BufferPool,
    longest_needle: usize,
    skip_bytes: u64,
    cancel: &AtomicBool,
    total_size: i64,
    progress: Option<&ProgressFn>,
) -> Result<()> {
    let overlap = longest_needle.saturating_sub(1);
    loop {
        let mut buf = pool.empty.get();
        let physical_before = reader.position();
        let n = coverage.read(reader, &mut buf.data[..])?;

        if let Some(cb) = progress {
            cb(physical_before, total_size);
        }

        if n > overlap {
            buf.bytes_read = n;
            let logical_before = coverage.logical_for_physical(physical_before);
            buf.begin_position = logical_before.saturating_sub(skip_bytes);
            debug!("dig: read window of {n} bytes at logical {}", buf.begin_position);
            pool.full.put(buf);

            if cancel.load(Ordering::Relaxed) {
                break;
            }
            if overlap > 0 {
                coverage.seek_relative(reader, -(overlap as i64))?;
            }
        } else {
            buf.bytes_read = 0;
            buf.begin_position = 0;
            pool.full.put(buf);
            break;
        }
    }
    Ok(())
}

/// Search one window for a single rule's headers and (when viable) footers.
/// `cutoff` excludes matches wholly contained in the re-read overlap with
/// the previous window (already recorded there); a match that extends past
/// `cutoff` is new regardless of where it starts.
#[allow(clippy::too_many_arguments)]
fn search_window(
    rule: &Rule,
    rule_id: usize,
    data: &[u8],
    window_start: u64,
    cutoff: usize,
    acc: &mut RuleOffsets,
    allow_overlap: bool,
    generate_database: bool,
) {
    for (pos, len) in rule.header.find_all(data, 0, allow_overlap) {
        if pos + len <= cutoff {
            continue;
        }
        acc.headers.push(MatchOffset {
            rule_id,
            position: window_start + pos as u64,
            matched_length: len,
        });
    }

    let Some(footer) = &rule.footer else { return };

    let viable = generate_database
        || acc.headers.last().map_or(false, |h| {
            h.position >= window_start || window_start - h.position < rule.max_length
        });
    if !viable {
        return;
    }

    for (pos, len) in footer.find_all(data, 0, allow_overlap) {
        if pos + len <= cutoff {
            continue;
        }
        acc.footers.push(MatchOffset {
            rule_id,
            position: window_start + pos as u64,
            matched_length: len,
        });
    }
}
