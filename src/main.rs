//! CLI entrypoint for `parseentry`.
//!
//! Reads a password-entry text dump from stdin (or `--input`), rebuilds the
//! record under the given title, and prints it as indented JSON. On a parse
//! failure the message goes to stderr and the process exits with status 1.
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};
use passentry::{io::read_input, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "parseentry",
    version,
    about = "Convert a password entry text dump to JSON"
)]
struct Args {
    /// Item title; `::` separators become `/`
    title: String,

    /// Read the entry from this file instead of stdin
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn write_record(record: &Record) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, record).context("write JSON")?;
    writeln!(out)?;
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let lines = read_input(args.input.as_deref())?;
    debug!("read {} lines", lines.len());
    let record = build_record(&args.title, &lines)?;
    write_record(&record)
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

fn main() {
    let args = parse_args();
    init_logger(args.verbose);
    if let Err(e) = run(&args) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
