//! CLI entrypoint for `pushtoop`.
//!
//! Reads one JSON object (as produced by `parseentry`) from stdin or
//! `--input` and creates a login item from it with `op item create`.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::LevelFilter;
use passentry::{
    io::read_text,
    onepassword::{DEFAULT_PROGRAM, OpCli},
    push::{build_item_args, parse_json},
};

#[derive(Parser, Debug)]
#[command(
    name = "pushtoop",
    version,
    about = "Create a 1Password login item from a JSON record"
)]
struct Args {
    /// Read the JSON record from this file instead of stdin
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Vault to create the item in (op default when omitted)
    #[arg(long = "vault", env = "PUSHTOOP_VAULT")]
    vault: Option<String>,

    /// Path or name of the 1Password CLI
    #[arg(long = "op-bin", env = "PUSHTOOP_OP_BIN", default_value = DEFAULT_PROGRAM)]
    op_bin: String,

    /// Directory for temp files holding multi-line fields
    #[arg(long = "temp-dir", env = "PUSHTOOP_TMPDIR")]
    temp_dir: Option<PathBuf>,

    /// Print the op command instead of running it
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
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

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@[]+,".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn run(args: &Args) -> Result<()> {
    let text = read_text(args.input.as_deref())?;
    let item = build_item_args(parse_json(&text)?)?;
    let op = OpCli::new(&args.op_bin).with_vault(args.vault.clone());
    let temp_root = args.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
    let argv = op.create_login(&item, &temp_root, args.dry_run)?;
    if args.dry_run {
        let rendered: Vec<String> = argv.iter().map(|a| shell_quote(a)).collect();
        println!("{} {}", shell_quote(op.program()), rendered.join(" "));
    } else {
        println!("{} {}", "created".green().bold(), item.title);
    }
    Ok(())
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
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = run(&args) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
