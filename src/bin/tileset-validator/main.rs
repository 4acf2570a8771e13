//! Tileset validator CLI - validates 3D Tiles tilesets and metadata schemas.

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use tileset_validator::io::FileResourceResolver;
use tileset_validator::validation::{
    SchemaValidator, Severity, TilesetValidator, ValidationContext, ValidationIssue, ValidationOptions,
    ValidationResult,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATE: &str = env!("TILESET_VALIDATOR_BUILD_DATE");

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut options_file = None;
    let mut report_file = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "--options" => options_file = iter.next().map(String::as_str),
            "--report" => report_file = iter.next().map(String::as_str),
            "--version" | "-V" => {
                println!("tileset-validator {} ({})", VERSION, BUILD_DATE);
                return;
            }
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let outcome = match filtered_args[0] {
        "tileset" | "t" => match filtered_args.get(1) {
            Some(file) => cmd_tileset(file, options_file, report_file),
            None => usage("tileset-validator tileset <tileset.json>"),
        },
        "schema" | "s" => match filtered_args.get(1) {
            Some(file) => cmd_schema(file, report_file),
            None => usage("tileset-validator schema <schema.json>"),
        },
        "help" | "h" | "--help" | "-h" => {
            print_help();
            return;
        }
        // A file alone is validated as a tileset
        file if file.ends_with(".json") || file.ends_with(".json.gz") => {
            cmd_tileset(file, options_file, report_file)
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn usage(text: &str) -> Result<bool> {
    bail!("missing file argument\nUsage: {}", text)
}

fn print_help() {
    println!("tileset-validator - 3D Tiles tileset validator");
    println!();
    println!("USAGE:");
    println!("    tileset-validator [OPTIONS] <COMMAND> <file>");
    println!();
    println!("COMMANDS:");
    println!("    t, tileset <file>             Validate a tileset JSON file");
    println!("    s, schema  <file>             Validate a metadata schema JSON file");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    --options <file> Read validation options from a JSON file");
    println!("    --report <file>  Write the validation report as JSON");
    println!("    -V, --version    Show version and build date");
    println!();
    println!("EXAMPLES:");
    println!("    tileset-validator tileset data/tileset.json");
    println!("    tileset-validator --report report.json t tileset.json");
    println!("    tileset-validator schema schema.json");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
    println!("    - The exit code is 1 when the input is invalid");
}

fn cmd_tileset(path: &str, options_file: Option<&str>, report_file: Option<&str>) -> Result<bool> {
    let options = match options_file {
        Some(file) => {
            ValidationOptions::load(file).with_context(|| format!("Could not read options from {}", file))?
        }
        None => ValidationOptions::default(),
    };
    tracing::debug!("Options: {:?}", options);
    let result =
        TilesetValidator::validate_file(path, options).with_context(|| format!("Could not validate {}", path))?;
    finish(path, &result, report_file)
}

fn cmd_schema(path: &str, report_file: Option<&str>) -> Result<bool> {
    let data = std::fs::read(path).with_context(|| format!("Could not read {}", path))?;
    let directory = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
    let mut context = ValidationContext::new(
        Arc::new(FileResourceResolver::new(directory)),
        ValidationOptions::default(),
    );
    SchemaValidator::validate_json(&data, &mut context);
    finish(path, &context.into_result(), report_file)
}

fn finish(path: &str, result: &ValidationResult, report_file: Option<&str>) -> Result<bool> {
    for issue in &result.issues {
        print_issue(issue, 0);
    }
    println!(
        "{}: {} errors, {} warnings, {} infos",
        path, result.num_errors, result.num_warnings, result.num_infos
    );
    if let Some(report_file) = report_file {
        std::fs::write(report_file, result.to_json_string()?)
            .with_context(|| format!("Could not write report to {}", report_file))?;
        tracing::info!("Wrote report to {}", report_file);
    }
    Ok(result.is_valid())
}

fn print_issue(issue: &ValidationIssue, depth: usize) {
    let indent = "  ".repeat(depth);
    if issue.severity == Severity::Error {
        eprintln!("{}{}", indent, issue);
    } else {
        println!("{}{}", indent, issue);
    }
    for cause in &issue.causes {
        print_issue(cause, depth + 1);
    }
}
