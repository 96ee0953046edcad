//! Top-level driver: wires dig, pairing, hfd, and extract into a single
//! carve of one input, plus a sequential multi-input batch runner.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{info, warn};
use strata_coverage::CoverageMap;
use strata_io::{InputReader, FileReader};
use strata_rules::RuleSet;

use crate::audit::Auditor;
use crate::dig::{dig, DigOptions, ProgressFn};
use crate::error::{Error, Result};
use crate::extract::{extract, ExtractOptions, DEFAULT_MAX_OPEN_FILES};
use crate::hfd;
use crate::pairer::{NamingOptions, PairOptions, Pairer};

/// Every knob a single carve of one input can be configured with.
pub struct CarveOptions {
    pub output_dir: PathBuf,
    pub skip_bytes: u64,
    pub allow_overlap: bool,
    pub preview: bool,
    pub embedded_aware: bool,
    pub carve_without_footer: bool,
    pub cluster_size: Option<u64>,
    pub organize_subdirectories: bool,
    pub max_files_per_subdir: u32,
    pub suppress_suffix: bool,
    pub generate_database: bool,
    pub coverage_blockmap: Option<PathBuf>,
    pub coverage_block_size: u32,
    pub max_open_files: usize,
    pub pool_depth: usize,
    /// Reports `(physical bytes read so far, total input size or -1)` as the
    /// dig pass streams through the input.
    pub progress: Option<Arc<ProgressFn>>,
}

impl Default for CarveOptions {
    fn default() -> Self {
        CarveOptions {
            output_dir: PathBuf::from("."),
            skip_bytes: 0,
            allow_overlap: true,
            preview: false,
            embedded_aware: false,
            carve_without_footer: false,
            cluster_size: None,
            organize_subdirectories: true,
            max_files_per_subdir: 1000,
            suppress_suffix: false,
            generate_database: false,
            coverage_blockmap: None,
            coverage_block_size: 0,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            pool_depth: strata_io::DEFAULT_POOL_DEPTH,
            progress: None,
        }
    }
}

pub struct CarveSummary {
    pub extents_found: usize,
    pub files_written: usize,
}

/// Dig, pair, (optionally) write a header/footer database, then extract a
/// single input against `rules`, appending to `auditor` along the way.
pub fn carve_one<R: InputReader>(
    reader: &mut R,
    rules: &RuleSet,
    options: &CarveOptions,
    auditor: &mut Auditor<File>,
    cancel: &AtomicBool,
) -> Result<CarveSummary> {
    fs::create_dir_all(&options.output_dir)
        .map_err(|e| Error::Output(format!("{}: {e}", options.output_dir.display())))?;

    reader.open()?;
    let image_size = reader.size();
    if image_size < 0 {
        return Err(Error::Input {
            input: reader.id().to_string(),
            message: "input size is unmeasurable".into(),
        });
    }
    let image_size = image_size as u64;

    let mut coverage = match &options.coverage_blockmap {
        Some(path) => CoverageMap::open(path, image_size, options.coverage_block_size, true, true)?,
        None => CoverageMap::disabled(),
    };

    let progress: Option<Box<ProgressFn>> = options.progress.as_ref().map(|p| {
        let p = Arc::clone(p);
        Box::new(move |read: u64, total: i64| p(read, total)) as Box<ProgressFn>
    });
    let dig_options = DigOptions {
        skip_bytes: options.skip_bytes,
        allow_overlap: options.allow_overlap,
        generate_database: options.generate_database,
        pool_depth: options.pool_depth,
        progress,
    };
    let dig_output = dig(reader, rules, &mut coverage, &dig_options, cancel)?;

    if options.generate_database {
        let input_basename = std::path::Path::new(reader.id())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_else(|| reader.id());
        let hfd_path = options.output_dir.join(format!("{input_basename}.hfd"));
        let mut hfd_file = File::create(&hfd_path)
            .map_err(|e| Error::Output(format!("{}: {e}", hfd_path.display())))?;
        hfd::write(&mut hfd_file, rules, &dig_output.offsets)?;
    }

    let pair_options = PairOptions {
        carve_without_footer: options.carve_without_footer,
        embedded_aware: options.embedded_aware,
        cluster_size: options.cluster_size,
    };
    let naming = NamingOptions {
        output_dir: options.output_dir.clone(),
        max_files_per_subdir: if options.organize_subdirectories {
            options.max_files_per_subdir
        } else {
            0
        },
        suppress_suffix: options.suppress_suffix,
    };
    let extents = Pairer::pair_all(rules, &dig_output.offsets, &pair_options, &naming, image_size);
    let extents_found = extents.len();
    info!("carve: {} planned {extents_found} extent(s)", reader.id());

    let extract_options = ExtractOptions {
        skip_bytes: options.skip_bytes,
        preview: options.preview,
        max_open_files: options.max_open_files,
    };
    let extract_output = extract(reader, &extents, &mut coverage, auditor, &extract_options, cancel)?;

    reader.close();

    Ok(CarveSummary {
        extents_found,
        files_written: extract_output.files_written,
    })
}

pub struct BatchItemResult {
    pub input_id: String,
    pub result: Result<CarveSummary>,
}

/// Carve each input in turn against the same rule set. Per the error
/// propagation policy: a config/input/output failure on one item is logged
/// and the batch continues; a resource-exhaustion failure or a cancellation
/// aborts the whole batch immediately.
pub fn carve_batch(
    inputs: &[PathBuf],
    rules: &RuleSet,
    options: &CarveOptions,
    auditor: &mut Auditor<File>,
    cancel: &AtomicBool,
) -> Vec<BatchItemResult> {
    let mut results = Vec::with_capacity(inputs.len());

    for input in inputs {
        let input_id = input.to_string_lossy().into_owned();
        info!("batch: carving {input_id}");
        let mut reader = FileReader::new(input);
        let result = carve_one(&mut reader, rules, options, auditor, cancel);

        let fatal_to_batch = matches!(result, Err(Error::Resource(_)) | Err(Error::Cancelled));
        if let Err(e) = &result {
            warn!("batch: {input_id} failed: {e}");
            let _ = auditor.write_error("carve", &input_id, &e.to_string());
        }

        results.push(BatchItemResult { input_id, result });

        if fatal_to_batch {
            break;
        }
    }

    results
}
