//! Hand-rolled flag parsing shared by the `carve` and `batch` subcommands,
//! mapping CLI flags onto `strata_engine::CarveOptions`.

use std::path::PathBuf;

use strata_engine::CarveOptions;

pub(crate) struct ParsedArgs {
    pub rules_path: PathBuf,
    pub options: CarveOptions,
    pub positional: Vec<String>,
}

pub(crate) fn parse(args: &[String]) -> Result<ParsedArgs, String> {
    let mut rules_path: Option<PathBuf> = None;
    let mut options = CarveOptions::default();
    let mut positional = Vec::new();
    let mut disable_overlap = false;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        macro_rules! next_value {
            () => {{
                i += 1;
                args.get(i).ok_or_else(|| format!("{arg} requires a value"))?
            }};
        }
        match arg {
            "-r" | "--rules" => rules_path = Some(PathBuf::from(next_value!())),
            "-o" | "--output" => options.output_dir = PathBuf::from(next_value!()),
            "-s" | "--skip" => {
                options.skip_bytes = next_value!()
                    .parse()
                    .map_err(|_| "--skip expects an integer byte count".to_string())?
            }
            "-p" | "--preview" => options.preview = true,
            "-e" | "--embedded-aware" => options.embedded_aware = true,
            "-b" | "--carve-without-footer" => options.carve_without_footer = true,
            "-d" | "--disable-overlap" => disable_overlap = true,
            "-n" | "--no-suffix" => options.suppress_suffix = true,
            "-g" | "--generate-database" => options.generate_database = true,
            "--disorganize" => options.organize_subdirectories = false,
            "--max-files-per-subdir" => {
                options.max_files_per_subdir = next_value!()
                    .parse()
                    .map_err(|_| "--max-files-per-subdir expects an integer".to_string())?
            }
            "-q" | "--aligned" => {
                let cluster: u64 = next_value!()
                    .parse()
                    .map_err(|_| "--aligned expects a cluster size in bytes".to_string())?;
                options.cluster_size = Some(cluster);
            }
            "--coverage" => options.coverage_blockmap = Some(PathBuf::from(next_value!())),
            "--coverage-block-size" => {
                options.coverage_block_size = next_value!()
                    .parse()
                    .map_err(|_| "--coverage-block-size expects an integer".to_string())?
            }
            "--max-open-files" => {
                options.max_open_files = next_value!()
                    .parse()
                    .map_err(|_| "--max-open-files expects an integer".to_string())?
            }
            // Verbosity is handled in `main` (it must be known before the
            // logger is initialized), but still recognized here so it
            // isn't mistaken for a positional argument.
            "-v" | "--verbose" => {}
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    options.allow_overlap = !disable_overlap;

    let rules_path = rules_path.ok_or("missing required -r/--rules <file>")?;
    Ok(ParsedArgs { rules_path, options, positional })
}
