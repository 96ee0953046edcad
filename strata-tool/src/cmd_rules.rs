use std::process;

use crate::rules_file;
use crate::style::*;

/// `strata-tool rules <rules-file>` — load and summarize a rules file
/// without carving anything. Useful for sanity-checking a config before a
/// long run against a multi-gigabyte image.
pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if args.is_empty() {
        eprintln!("Usage: strata-tool rules <rules-file>");
        process::exit(1);
    }

    let path = &args[0];
    let rules = rules_file::load(path)?;

    header(&format!("Rules: {path}"));
    kv("Wildcard byte", &format!("{:#04x}", rules.wildcard()));
    kv("Rule count", &rules.len().to_string());
    kv("Longest needle", &format!("{} bytes", rules.longest_needle()));
    println!();

    println!("  {DIM}{:<10}  {:>12}  {}{RESET}", "suffix", "max length", "pairing");
    for (_, rule) in rules.iter_indexed() {
        let suffix = rule.suffix.as_deref().unwrap_or("(none)");
        println!("  {suffix:<10}  {:>12}  {:?}", rule.max_length, rule.pairing);
    }
    println!();

    Ok(())
}
