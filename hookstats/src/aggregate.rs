//! hookstats-aggregate - print aggregate insights for a log directory
//!
//! Read-only: never touches the managed document or deletes anything.
//! Prints the insights as JSON on stdout and always exits 0.

mod cli;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use hookstats_core::LogAggregator;

const BIN_NAME: &str = "hookstats-aggregate";

#[derive(Parser)]
#[command(name = "hookstats-aggregate")]
#[command(about = "Print aggregate insights over hook event logs as JSON")]
#[command(version)]
struct Args {
    #[command(flatten)]
    source: cli::SourceArgs,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Verbose output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };

    if let Err(e) = run(args) {
        eprintln!("{BIN_NAME}: {e:#}");
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = args.source.load_config(BIN_NAME);
    args.source.apply(&mut config);

    let _log_guard = cli::init_logging(BIN_NAME, &config, args.verbose);

    let log_dir = config.logs.dir();
    let insights = LogAggregator::new(config.insights.top_k)
        .with_extension(&config.logs.extension_filter())
        .aggregate(&log_dir);

    let json = insights
        .to_json(args.pretty)
        .context("failed to serialize insights")?;
    println!("{}", json);

    if insights.files_scanned == 0 {
        eprintln!("{BIN_NAME}: no log files found in {}", log_dir.display());
    }
    Ok(())
}
