mod analysis;
mod config;
mod dataset;
mod error;
mod hypothesis;
mod insights;
mod manager;
mod prepare;
mod range_dist;
mod report;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Normalize a channel's video metadata and test hypotheses about it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding videos.json and the generated files.
    #[arg(long)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize videos.json into dataset.msgpack.
    Prepare,

    /// Run the configured analyses and write results.json.
    Analyze(AnalyzeArgs),

    /// Prepare, then analyze.
    Run(AnalyzeArgs),

    /// Remove dataset.msgpack and results.json.
    Clean,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Config file to use instead of <WORK_DIR>/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    log::debug!("{cli:?}");

    let mgr = Manager::new(&cli.work_dir)
        .with_context(|| format!("failed to open work directory {:?}", cli.work_dir))?;

    match cli.command {
        Command::Prepare => mgr.prepare_dataset()?,
        Command::Analyze(args) => mgr.analyze_dataset(args.config.as_deref())?,
        Command::Run(args) => {
            mgr.prepare_dataset()?;
            mgr.analyze_dataset(args.config.as_deref())?;
        }
        Command::Clean => mgr.clean_outputs()?,
    }

    Ok(())
}
