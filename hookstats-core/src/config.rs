//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/hookstats/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/hookstats/` (~/.config/hookstats/)
//! - Data (event logs): `$XDG_DATA_HOME/hookstats/` (~/.local/share/hookstats/)
//! - State/Logs: `$XDG_STATE_HOME/hookstats/` (~/.local/state/hookstats/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where event logs live
    #[serde(default)]
    pub logs: LogsConfig,

    /// Aggregation settings
    #[serde(default)]
    pub insights: InsightsConfig,

    /// The managed document and its markers
    #[serde(default)]
    pub document: DocumentConfig,

    /// Log retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event log location
#[derive(Debug, Deserialize, Clone)]
pub struct LogsConfig {
    /// Sanctioned log root; the cleaner never deletes outside it
    pub root: Option<PathBuf>,
    /// Directory to aggregate and clean (defaults to the root)
    pub dir: Option<PathBuf>,
    /// Log file extension, with or without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            root: None,
            dir: None,
            extension: default_extension(),
        }
    }
}

impl LogsConfig {
    /// Resolved log root
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(Config::default_log_root)
    }

    /// Resolved log directory
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| self.root())
    }

    /// Extension normalized to a `.suffix`
    pub fn extension_filter(&self) -> String {
        normalize_extension(&self.extension)
    }
}

fn default_extension() -> String {
    "jsonl".to_string()
}

/// Turn `jsonl` or `.jsonl` into `.jsonl`.
pub fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.'))
}

/// Aggregation settings
#[derive(Debug, Deserialize, Clone)]
pub struct InsightsConfig {
    /// Number of common paths to keep
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Managed document settings
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    /// Document to update (relative paths resolve against the working directory)
    #[serde(default = "default_document_path")]
    pub path: PathBuf,

    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    #[serde(default = "default_end_marker")]
    pub end_marker: String,

    /// Appended to the document's file name to form the backup path
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
            start_marker: default_start_marker(),
            end_marker: default_end_marker(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

fn default_document_path() -> PathBuf {
    PathBuf::from("CLAUDE.md")
}

fn default_start_marker() -> String {
    "<!-- hookstats:start -->".to_string()
}

fn default_end_marker() -> String {
    "<!-- hookstats:end -->".to_string()
}

fn default_backup_suffix() -> String {
    ".bak".to_string()
}

/// Retention configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Set to false to never delete log files
    #[serde(default = "default_retention_enabled")]
    pub enabled: bool,

    /// Files older than this many hours are deleted
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_retention_enabled(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> chrono::Duration {
        // Clamped to a century; chrono panics on out-of-range durations
        let hours = self.max_age_hours.min(MAX_AGE_HOURS_CAP) as i64;
        chrono::Duration::hours(hours)
    }
}

const MAX_AGE_HOURS_CAP: u64 = 24 * 365 * 100;

fn default_retention_enabled() -> bool {
    true
}

fn default_max_age_hours() -> u64 {
    24 * 7
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.insights.top_k == 0 {
            return Err(Error::Config(
                "insights.top_k must be at least 1".to_string(),
            ));
        }
        if self.logs.extension.trim_start_matches('.').is_empty() {
            return Err(Error::Config("logs.extension must not be empty".to_string()));
        }

        let doc = &self.document;
        for (name, marker) in [
            ("document.start_marker", &doc.start_marker),
            ("document.end_marker", &doc.end_marker),
        ] {
            if marker.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
            if marker.contains('\n') || marker.contains('\r') {
                return Err(Error::Config(format!("{} must be a single line", name)));
            }
        }
        if doc.start_marker.trim_end() == doc.end_marker.trim_end() {
            return Err(Error::Config(
                "document.start_marker and document.end_marker must differ".to_string(),
            ));
        }
        if doc.backup_suffix.is_empty() {
            return Err(Error::Config(
                "document.backup_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/hookstats/config.toml` (~/.config/hookstats/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("hookstats").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/hookstats/` (~/.local/share/hookstats/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("hookstats")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/hookstats/` (~/.local/state/hookstats/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("hookstats")
    }

    /// Returns the default event log root
    ///
    /// `$XDG_DATA_HOME/hookstats/events/`
    pub fn default_log_root() -> PathBuf {
        Self::data_dir().join("events")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/hookstats/hookstats.log` (~/.local/state/hookstats/hookstats.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("hookstats.log")
    }
}
