//! strata-tool — CLI front-end for the `strata` file-carving engine.
//!
//! # Usage
//!
//! ```text
//! strata-tool carve <image> -r <rules-file> -o <output-dir> [OPTIONS]
//! strata-tool batch <list-file> -r <rules-file> -o <output-dir> [OPTIONS]
//! strata-tool rules <rules-file>
//! ```

mod cli;
mod cmd_batch;
mod cmd_carve;
mod cmd_rules;
mod rules_file;
mod style;

use std::env;
use std::process;

use style::{BOLD, DIM, GREEN, RED, RESET};

fn main() {
    let args: Vec<String> = env::args().collect();

    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "carve" => cmd_carve::run(&args[2..]),
        "batch" => cmd_batch::run(&args[2..]),
        "rules" => cmd_rules::run(&args[2..]),
        "-h" | "--help" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("{RED}Unknown command: {other}{RESET}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("{RED}error:{RESET} {e}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!(
        r#"
{BOLD}strata-tool{RESET} — file-carving engine CLI

{DIM}Dig an input for header/footer patterns, pair them into extents, extract.{RESET}

{BOLD}USAGE:{RESET}
    strata-tool <COMMAND> [OPTIONS]

{BOLD}COMMANDS:{RESET}
    {GREEN}carve{RESET}   <image> -r <rules> -o <out>        Carve a single input
    {GREEN}batch{RESET}   <list>  -r <rules> -o <out>        Carve every input named in a list file
    {GREEN}rules{RESET}   <rules-file>                       Load and summarize a rules file

{BOLD}EXAMPLES:{RESET}
    strata-tool carve image.dd -r photo.rules -o out/
    strata-tool carve image.dd -r photo.rules -o out/ -e -b -g
    strata-tool batch images.txt -r photo.rules -o out/

{DIM}Run strata-tool <command> help for details{RESET}
"#
    );
}
