//! `lar` — Lariat analyzer shell.
//!
//! Reads a stringified function from a file (or stdin), runs the closure
//! analyzer against the Node ambient-global table, and prints the analysis
//! as JSON.  Exit status 1 means the function could not be analyzed (or an
//! arrow captured `this`); the diagnostic goes to stderr.

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use lariat_core::closure::{self, globals};
use lariat_core::error::LariatError;

#[derive(Parser)]
#[command(name = "lar", about = "Analyze a host-stringified function", version)]
struct Args {
    /// File containing the function text; reads stdin when omitted or `-`.
    input: Option<String>,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,
}

fn read_source(input: Option<&str>) -> Result<String> {
    match input {
        Some(path) if path != "-" => {
            std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
        }
        _ => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("reading stdin")?;
            Ok(source)
        }
    }
}

fn print_json(analysis: &closure::FunctionAnalysis, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(analysis)?
    } else {
        serde_json::to_string_pretty(analysis)?
    };
    println!("{json}");
    Ok(())
}

fn run(args: &Args) -> Result<ExitCode> {
    let source = read_source(args.input.as_deref())?;
    let source = source.trim();

    match closure::analyze(source, globals::is_node_global) {
        Ok(analysis) => {
            print_json(&analysis, args.compact)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(LariatError::ArrowCapturedThis(analysis)) => {
            // The analysis is still complete; print it alongside the
            // diagnostic so callers can inspect what was captured.
            print_json(&analysis, args.compact)?;
            eprintln!(
                "lar: {}",
                LariatError::ArrowCapturedThis(analysis)
            );
            Ok(ExitCode::FAILURE)
        }
        Err(other) => {
            eprintln!("lar: {other}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("lar: {err:#}");
            ExitCode::FAILURE
        }
    }
}
