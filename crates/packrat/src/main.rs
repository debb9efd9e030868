use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use packrat::{Compiler, Config};

#[derive(Parser, Debug)]
#[command(name = "packrat")]
#[command(about = "Bundle a CommonJS module graph into a single JavaScript file")]
#[command(version)]
struct Cli {
    /// Configuration file to use instead of ./packrat.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, takes precedence over the verbosity flag
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Config::discover(&cwd)?
        }
    };

    let output = Compiler::new(config)?.run()?;
    info!(
        "Wrote {} ({} modules, entry {})",
        output.output_file.display(),
        output.module_count,
        output.entry
    );
    Ok(())
}
