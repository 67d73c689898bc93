//! hookstats - keep a documentation region in sync with hook event logs
//!
//! One run aggregates the event logs, rewrites the marker-delimited region of
//! the managed document, then retires log files past their retention age.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Event logs: $XDG_DATA_HOME/hookstats/events/ (~/.local/share/hookstats/events/)
//! - Logs: $XDG_STATE_HOME/hookstats/hookstats.log (~/.local/state/hookstats/hookstats.log)
//! - Config: $XDG_CONFIG_HOME/hookstats/config.toml (~/.config/hookstats/config.toml)
//!
//! The process always exits 0: it runs from hooks and schedulers that must
//! never be blocked by a maintenance failure. Problems are printed to stderr.

mod cli;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use hookstats_core::{Pipeline, PipelineConfig};
use std::path::PathBuf;

const BIN_NAME: &str = "hookstats";

#[derive(Parser)]
#[command(name = "hookstats")]
#[command(about = "Aggregate hook event logs into a managed document and retire old logs")]
#[command(version)]
struct Args {
    #[command(flatten)]
    source: cli::SourceArgs,

    /// Managed document to update
    #[arg(long, value_name = "PATH")]
    document: Option<PathBuf>,

    /// Delete log files older than this many hours
    #[arg(long, value_name = "HOURS")]
    max_age_hours: Option<u64>,

    /// Aggregate and update, but leave log files alone
    #[arg(long)]
    skip_cleanup: bool,

    /// Report which log files would be deleted without deleting them
    #[arg(long)]
    dry_run: bool,

    /// Print the aggregate insights as JSON on stdout
    #[arg(long)]
    print_insights: bool,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too
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
    if let Some(document) = &args.document {
        config.document.path = document.clone();
    }
    if let Some(hours) = args.max_age_hours {
        config.retention.max_age_hours = hours;
    }

    let _log_guard = cli::init_logging(BIN_NAME, &config, args.verbose);
    tracing::info!("hookstats starting");

    let mut pipeline_config = PipelineConfig::from_config(&config);
    pipeline_config.skip_cleanup |= args.skip_cleanup;
    pipeline_config.dry_run = args.dry_run;

    let report = Pipeline::new(pipeline_config).run();

    if args.print_insights {
        let json = report
            .insights
            .to_json(true)
            .context("failed to serialize insights")?;
        println!("{}", json);
    }

    for diagnostic in &report.diagnostics {
        eprintln!("{BIN_NAME}: warning: {diagnostic}");
    }
    if let Some(clean) = &report.clean {
        if args.dry_run {
            for path in &clean.deleted {
                eprintln!("{BIN_NAME}: would delete {}", path.display());
            }
        }
    }
    eprintln!("{BIN_NAME}: {}", report.summary());

    tracing::info!(exit_code = report.exit_code(), "hookstats finished");
    Ok(())
}
