//! Argument handling shared by the hookstats binaries.
//!
//! Both binaries exit 0 on every path, so configuration and logging problems
//! are reported on stderr and the run falls back to defaults.

use anyhow::Context;
use clap::Args;
use hookstats_core::Config;
use std::path::{Path, PathBuf};

/// Where to read event logs from.
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Config file (default: $XDG_CONFIG_HOME/hookstats/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the event logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Sanctioned log root; cleanup never deletes outside it
    #[arg(long, value_name = "DIR")]
    pub log_root: Option<PathBuf>,

    /// Number of frequently referenced paths to report
    #[arg(long, value_name = "K", value_parser = clap::value_parser!(u64).range(1..))]
    pub top_k: Option<u64>,
}

impl SourceArgs {
    /// Load configuration, or defaults if it cannot be loaded.
    pub fn load_config(&self, bin_name: &str) -> Config {
        match load(self.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{bin_name}: {e:#}; using defaults");
                Config::default()
            }
        }
    }

    /// Apply command-line overrides on top of `config`.
    ///
    /// The log root only ever comes from `--log-root` or `[logs] root`;
    /// `--log-dir` never widens what cleanup may delete.
    pub fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.log_root {
            config.logs.root = Some(root.clone());
        }
        if let Some(dir) = &self.log_dir {
            config.logs.dir = Some(dir.clone());
        }
        if let Some(top_k) = self.top_k {
            config.insights.top_k = usize::try_from(top_k).unwrap_or(usize::MAX);
        }
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Config::load().context("failed to load configuration"),
    }
}

/// Start file and stderr logging, degrading to stderr only.
pub fn init_logging(
    bin_name: &str,
    config: &Config,
    verbosity: u8,
) -> Option<hookstats_core::logging::LoggingGuard> {
    match hookstats_core::logging::init(&config.logging, verbosity)
        .context("failed to initialize logging")
    {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{bin_name}: {e:#}; logging to stderr only");
            hookstats_core::logging::init_stderr(verbosity);
            None
        }
    }
}
