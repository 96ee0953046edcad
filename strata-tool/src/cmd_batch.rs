use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;

use strata_engine::Auditor;

use crate::cli;
use crate::rules_file;
use crate::style::*;

/// Carve every input named (one path per non-blank line) in a batch list
/// file against a single rule set.
pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if args.is_empty() {
        print_usage();
        process::exit(1);
    }

    let parsed = match cli::parse(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{RED}error:{RESET} {e}");
            print_usage();
            process::exit(2);
        }
    };

    let list_path = parsed
        .positional
        .first()
        .ok_or("usage: strata-tool batch <list-file> -r <rules-file> -o <output-dir>")?;

    let list_text = fs::read_to_string(list_path)?;
    let inputs: Vec<PathBuf> = list_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(PathBuf::from)
        .collect();

    if inputs.is_empty() {
        return Err("batch list contains no input paths".into());
    }

    let rules = rules_file::load(&parsed.rules_path)
        .map_err(|e| format!("loading rules file {}: {e}", parsed.rules_path.display()))?;

    header(&format!("Batch carving {} input(s)", inputs.len()));
    kv("Rules", &format!("{} ({})", parsed.rules_path.display(), rules.len()));
    kv("Output", &parsed.options.output_dir.display().to_string());

    fs::create_dir_all(&parsed.options.output_dir)?;
    let audit_path = parsed.options.output_dir.join("audit.txt");
    let mut auditor = Auditor::create(&audit_path)?;
    auditor.write_header(
        env!("CARGO_PKG_VERSION"),
        "n/a",
        &std::env::args().collect::<Vec<_>>().join(" "),
        list_path,
        parsed.options.skip_bytes,
    )?;

    let cancel = AtomicBool::new(false);
    let results = strata_engine::carve_batch(&inputs, &rules, &parsed.options, &mut auditor, &cancel);
    auditor.write_completed("n/a")?;

    let mut failures = 0usize;
    for item in &results {
        match &item.result {
            Ok(summary) => println!(
                "  {GREEN}ok{RESET}   {:<40} {} extent(s), {} file(s)",
                item.input_id, summary.extents_found, summary.files_written
            ),
            Err(e) => {
                failures += 1;
                println!("  {RED}fail{RESET} {:<40} {e}", item.input_id);
            }
        }
    }
    println!();

    if failures > 0 {
        process::exit(1);
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"
{BOLD}strata-tool batch{RESET} <list-file> -r <rules-file> -o <output-dir> [OPTIONS]

One input path per line in <list-file>; blank lines and `#` comments skipped.
Accepts the same [OPTIONS] as `strata-tool carve`.
"#
    );
}
