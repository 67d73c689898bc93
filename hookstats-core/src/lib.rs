//! # hookstats-core
//!
//! Core library for hookstats - tool-usage insights from hook event logs.
//!
//! This library provides:
//! - Parsing and aggregation of JSONL hook logs into [`AggregateInsights`]
//! - Markdown rendering of the insights
//! - Atomic replacement of a marker-delimited region in a hand-edited document
//! - TTL retention of old log files, scoped to one log root
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! One maintenance run is a fixed sequence of leaf steps:
//! - **Aggregate:** every `*.jsonl` in the log directory → [`AggregateInsights`]
//! - **Update:** insights → rendered block → swapped into the managed document
//! - **Clean:** expired log files deleted from the log directory
//!
//! No step can fail the run; each reports its outcome as a value.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hookstats_core::{Config, Pipeline, PipelineConfig};
//!
//! let config = Config::load().expect("failed to load config");
//! let report = Pipeline::new(PipelineConfig::from_config(&config)).run();
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use document::RegionUpdater;
pub use error::{Error, Result};
pub use ingest::LogAggregator;
pub use pipeline::{ExitReport, Pipeline, PipelineConfig};
pub use render::MarkdownRenderer;
pub use retention::RetentionCleaner;
pub use types::*;

// Public modules
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod retention;
pub mod types;
