//! `ExtractEngine` — builds per-window extent work queues from the Pairer's
//! output, then streams a second sequential pass over the input, writing
//! carved bytes into output files and appending audit records.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use strata_coverage::CoverageMap;
use strata_io::{InputReader, Whence, WINDOW_SIZE};

use crate::audit::Auditor;
use crate::error::{Error, Result};
use crate::extent::Extent;

/// Default cap on simultaneously open carved-file handles.
#[cfg(unix)]
pub const DEFAULT_MAX_OPEN_FILES: usize = 512;
#[cfg(not(unix))]
pub const DEFAULT_MAX_OPEN_FILES: usize = 20;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Bytes to skip at the start of the input before the second pass;
    /// must match the dig pass's `skip_bytes` for extent offsets to land
    /// correctly.
    pub skip_bytes: u64,
    /// Skip all opens/writes; still produce the audit log.
    pub preview: bool,
    pub max_open_files: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            skip_bytes: 0,
            preview: false,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    StartStop,
    Start,
    Continue,
    Stop,
}

struct Queued {
    extent_index: usize,
    role: Role,
}

pub struct ExtractOutput {
    pub files_written: usize,
}

/// Run the extract pass: walk `reader` window by window, draining each
/// window's queue of extent references and writing the relevant slice of
/// the buffer into each extent's output file.
pub fn extract<R: InputReader, W: Write>(
    reader: &mut R,
    extents: &[Extent],
    coverage: &mut CoverageMap,
    auditor: &mut Auditor<W>,
    options: &ExtractOptions,
    cancel: &AtomicBool,
) -> Result<ExtractOutput> {
    reader.open()?;
    if options.skip_bytes > 0 {
        reader.seek(options.skip_bytes as i64, Whence::Set)?;
    }

    info!(
        "extract: starting {} ({} extents, preview={})",
        reader.id(),
        extents.len(),
        options.preview
    );

    let window_size = WINDOW_SIZE as u64;
    let num_windows = extents
        .iter()
        .map(|e| e.stop_window(window_size) + 1)
        .max()
        .unwrap_or(0);
    let mut queues: Vec<Vec<Queued>> = (0..num_windows).map(|_| Vec::new()).collect();

    for (extent_index, extent) in extents.iter().enumerate() {
        let start_window = extent.start_window(window_size);
        let stop_window = extent.stop_window(window_size);
        if start_window == stop_window {
            queues[start_window as usize].push(Queued { extent_index, role: Role::StartStop });
        } else {
            queues[start_window as usize].push(Queued { extent_index, role: Role::Start });
            for window in (start_window + 1)..stop_window {
                queues[window as usize].push(Queued { extent_index, role: Role::Continue });
            }
            queues[stop_window as usize].push(Queued { extent_index, role: Role::Stop });
        }
    }

    let mut handles: Vec<Option<std::fs::File>> = (0..extents.len()).map(|_| None).collect();
    let mut live_open = 0usize;
    let mut buf = vec![0u8; WINDOW_SIZE];
    let mut files_written = 0usize;
    let mut window_index = 0u64;

    while window_index < num_windows {
        if cancel.load(Ordering::Relaxed) {
            warn!("extract: cancellation observed at window {window_index}");
            return Err(Error::Cancelled);
        }

        if queues[window_index as usize].is_empty() {
            debug!("extract: window {window_index} has no queued extents, big-seeking past it");
            coverage.seek_relative(reader, window_size as i64)?;
            window_index += 1;
            continue;
        }

        let window_start = window_index * window_size;
        let bytes_in_window = if options.preview {
            let before = reader.position();
            coverage.seek_relative(reader, window_size as i64)?;
            (reader.position() - before) as usize
        } else {
            coverage.read(reader, &mut buf)?
        };

        if bytes_in_window == 0 {
            break;
        }

        for queued in &queues[window_index as usize] {
            let extent = &extents[queued.extent_index];
            let (offset, len) = slice_for_role(queued.role, extent, window_start, bytes_in_window as u64);

            let needs_open =
                matches!(queued.role, Role::StartStop | Role::Start) || handles[queued.extent_index].is_none();
            if needs_open && !options.preview {
                if let Some(parent) = std::path::Path::new(&extent.output_name).parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| Error::Output(format!("{}: {e}", parent.display())))?;
                }
                let file = OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&extent.output_name)
                    .map_err(|e| Error::Output(format!("opening {}: {e}", extent.output_name)))?;
                handles[queued.extent_index] = Some(file);
                live_open += 1;
            }

            if !options.preview {
                let file = handles[queued.extent_index]
                    .as_mut()
                    .expect("opened above or already open");
                file.write_all(&buf[offset as usize..(offset + len) as usize])
                    .map_err(|e| Error::Output(format!("writing {}: {e}", extent.output_name)))?;
            }

            let at_carve_boundary = matches!(queued.role, Role::StartStop | Role::Stop);
            let should_close = at_carve_boundary || live_open > options.max_open_files;

            if should_close {
                if let Some(file) = handles[queued.extent_index].take() {
                    drop(file);
                    live_open -= 1;
                    if !at_carve_boundary {
                        debug!(
                            "extract: closing {} early, {live_open} handles still open (cap {})",
                            extent.output_name, options.max_open_files
                        );
                    }
                }
                if at_carve_boundary {
                    files_written += 1;
                    for fragment in coverage.fragments_for_extent(extent.start, extent.stop) {
                        auditor.write_fragment(&extent.output_name, &fragment, extent.truncated, reader.id())?;
                        coverage.record_fragment(&fragment)?;
                    }
                }
            }
        }

        window_index += 1;
    }

    info!("extract: finished {}, wrote {files_written} file(s)", reader.id());
    Ok(ExtractOutput { files_written })
}

/// Which slice of the current window's buffer belongs to this extent,
/// per the window-role table below.
fn slice_for_role(role: Role, extent: &Extent, window_start: u64, bytes_in_window: u64) -> (u64, u64) {
    match role {
        Role::StartStop => {
            let offset = extent.start - window_start;
            (offset, extent.stop - extent.start + 1)
        }
        Role::Start => {
            let offset = extent.start - window_start;
            (offset, bytes_in_window - offset)
        }
        Role::Continue => (0, bytes_in_window),
        Role::Stop => (0, extent.stop - window_start + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Auditor;
    use std::sync::atomic::AtomicBool;
    use strata_io::MemoryReader;

    fn extent(rule_id: usize, start: u64, stop: u64, output_name: &str) -> Extent {
        Extent {
            rule_id,
            start,
            stop,
            truncated: false,
            output_name: output_name.to_string(),
        }
    }

    #[test]
    fn single_window_extent_round_trips_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.bin");

        let mut data = vec![0u8; 512];
        data[10..20].copy_from_slice(b"HELLOWORLD");
        let mut reader = MemoryReader::new("mem", data);

        let extents = vec![extent(0, 10, 19, out_path.to_str().unwrap())];
        let mut coverage = CoverageMap::disabled();
        let mut audit_buf = Vec::new();
        let mut auditor = Auditor::new(&mut audit_buf);
        let cancel = AtomicBool::new(false);

        let output = extract(
            &mut reader,
            &extents,
            &mut coverage,
            &mut auditor,
            &ExtractOptions::default(),
            &cancel,
        )
        .unwrap();

        assert_eq!(output.files_written, 1);
        let contents = fs::read(&out_path).unwrap();
        assert_eq!(contents, b"HELLOWORLD");
    }

    #[test]
    fn extent_spanning_two_windows_reassembles_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.bin");

        let window = WINDOW_SIZE as u64;
        let start = window - 5;
        let stop = window + 4;
        let mut data = vec![0u8; (window * 2) as usize];
        let marker: Vec<u8> = (0..10u8).collect();
        data[start as usize..=stop as usize].copy_from_slice(&marker);
        let mut reader = MemoryReader::new("mem", data);

        let extents = vec![extent(0, start, stop, out_path.to_str().unwrap())];
        let mut coverage = CoverageMap::disabled();
        let mut audit_buf = Vec::new();
        let mut auditor = Auditor::new(&mut audit_buf);
        let cancel = AtomicBool::new(false);

        extract(
            &mut reader,
            &extents,
            &mut coverage,
            &mut auditor,
            &ExtractOptions::default(),
            &cancel,
        )
        .unwrap();

        let contents = fs::read(&out_path).unwrap();
        assert_eq!(contents, marker);
    }

    #[test]
    fn preview_mode_writes_no_files_but_audits() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.bin");

        let mut data = vec![0u8; 512];
        data[10..20].copy_from_slice(b"HELLOWORLD");
        let mut reader = MemoryReader::new("mem", data);

        let extents = vec![extent(0, 10, 19, out_path.to_str().unwrap())];
        let mut coverage = CoverageMap::disabled();
        let mut audit_buf = Vec::new();
        let mut auditor = Auditor::new(&mut audit_buf);
        let cancel = AtomicBool::new(false);

        let options = ExtractOptions { preview: true, ..ExtractOptions::default() };
        let output = extract(&mut reader, &extents, &mut coverage, &mut auditor, &options, &cancel).unwrap();

        assert_eq!(output.files_written, 1);
        assert!(!out_path.exists());
        assert!(String::from_utf8(audit_buf).unwrap().contains("10\tNO\t10"));
    }

    #[test]
    fn coverage_skip_splits_output_into_physical_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.bin");
        let cov_path = dir.path().join("cov.bin");

        // 1 MiB input, block 1 (bytes 512..1024) already covered.
        let mut data = vec![0u8; 1024 * 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut reader = MemoryReader::new("mem", data.clone());

        let mut coverage = CoverageMap::open(&cov_path, 1024 * 1024, 512, true, true).unwrap();
        coverage.record_block(1).unwrap();

        // logical [500, 600) maps to physical fragments [500, 511] and [1024, 1112].
        let extents = vec![extent(0, 500, 600, out_path.to_str().unwrap())];
        let mut audit_buf = Vec::new();
        let mut auditor = Auditor::new(&mut audit_buf);
        let cancel = AtomicBool::new(false);

        extract(
            &mut reader,
            &extents,
            &mut coverage,
            &mut auditor,
            &ExtractOptions::default(),
            &cancel,
        )
        .unwrap();

        let audit_text = String::from_utf8(audit_buf).unwrap();
        assert!(audit_text.contains("500\tNO\t12"));
        assert!(audit_text.contains("1024\tNO\t89"));

        let mut expected = data[500..512].to_vec();
        expected.extend_from_slice(&data[1024..1113]);
        let contents = fs::read(&out_path).unwrap();
        assert_eq!(contents, expected);
    }
}
