use std::process;
use std::sync::atomic::AtomicBool;

use strata_engine::Auditor;

use crate::cli;
use crate::rules_file;
use crate::style::*;

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

    let input = parsed
        .positional
        .first()
        .ok_or("usage: strata-tool carve <image> -r <rules-file> -o <output-dir>")?;

    let rules = rules_file::load(&parsed.rules_path)
        .map_err(|e| format!("loading rules file {}: {e}", parsed.rules_path.display()))?;

    header(&format!("Carving {input}"));
    kv("Rules", &format!("{} ({})", parsed.rules_path.display(), rules.len()));
    kv("Output", &parsed.options.output_dir.display().to_string());

    let mut reader = strata_io::FileReader::new(input);
    let audit_path = parsed.options.output_dir.join("audit.txt");
    std::fs::create_dir_all(&parsed.options.output_dir)?;
    let mut auditor = Auditor::create(&audit_path)?;
    auditor.write_header(
        env!("CARGO_PKG_VERSION"),
        "n/a",
        &std::env::args().collect::<Vec<_>>().join(" "),
        input,
        parsed.options.skip_bytes,
    )?;

    let cancel = AtomicBool::new(false);
    let summary = strata_engine::carve_one(&mut reader, &rules, &parsed.options, &mut auditor, &cancel)?;
    auditor.write_completed("n/a")?;

    kv("Extents planned", &summary.extents_found.to_string());
    kv("Files written", &summary.files_written.to_string());
    println!();

    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"
{BOLD}strata-tool carve{RESET} <image> -r <rules-file> -o <output-dir> [OPTIONS]

{BOLD}OPTIONS:{RESET}
    {GREEN}-s, --skip <n>{RESET}              Skip the first n bytes of the input
    {GREEN}-p, --preview{RESET}               Plan extents and write the audit log without writing files
    {GREEN}-e, --embedded-aware{RESET}        Balanced header/footer matching for nested files
    {GREEN}-b, --carve-without-footer{RESET}  Truncate to max-length when no footer is found
    {GREEN}-d, --disable-overlap{RESET}       Disallow overlapping needle matches
    {GREEN}-n, --no-suffix{RESET}             Never append a file extension
    {GREEN}-q, --aligned <n>{RESET}           Only carve headers aligned to an n-byte cluster
    {GREEN}-g, --generate-database{RESET}     Write a <image>.hfd header/footer database
    {GREEN}--disorganize{RESET}               Don't roll output files into per-rule subdirectories
    {GREEN}--coverage <path>{RESET}           Skip/record carved regions in a coverage blockmap
    {GREEN}-v, --verbose{RESET}               Debug-level logging
"#
    );
}
