//! Ingestion layer: hook log files in, [`AggregateInsights`] out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Log directory  │ ──► │  LogAggregator   │ ──► │ AggregateInsights│
//! │  (*.jsonl)      │     │  parse_line      │     │                  │
//! └─────────────────┘     │  PathCounter     │     └──────────────────┘
//!                         └──────────────────┘
//! ```
//!
//! Files are read in sorted name order, so the result depends only on file
//! names and contents, never on directory enumeration order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hookstats_core::ingest::LogAggregator;
//!
//! let insights = LogAggregator::new(5).aggregate("/var/log/hooks".as_ref());
//! println!("{} sessions", insights.session_count);
//! ```

mod parser;
mod paths;

pub use parser::{parse_line, LineSkip};
pub use paths::{extract_paths, PathCounter};

use crate::error::Result;
use crate::types::{AggregateInsights, EventKind, LogEvent};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Default number of common paths kept in the insights.
pub const DEFAULT_TOP_K: usize = 5;

/// Folds every log file in a directory into one [`AggregateInsights`].
#[derive(Debug, Clone)]
pub struct LogAggregator {
    top_k: usize,
    extension: String,
}

impl Default for LogAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl LogAggregator {
    /// Aggregator for `.jsonl` files keeping `top_k` common paths.
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            extension: ".jsonl".to_string(),
        }
    }

    /// Match files with a different suffix (e.g. `.log`).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = crate::config::normalize_extension(extension);
        self
    }

    /// Aggregate all matching files directly inside `log_dir`.
    ///
    /// Never fails: a missing directory, an unreadable file or a malformed
    /// line degrades to fewer (or zero) counted events.
    pub fn aggregate(&self, log_dir: &Path) -> AggregateInsights {
        let generated_at = Utc::now();

        let files = match self.discover_files(log_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(
                    dir = %log_dir.display(),
                    error = %e,
                    "Failed to list log files"
                );
                return AggregateInsights::empty(generated_at);
            }
        };

        let mut fold = InsightsFold::new();
        for path in &files {
            if let Err(e) = fold.read_file(path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read log file, keeping events read so far"
                );
            }
        }

        let insights = fold.finish(self.top_k, generated_at);
        tracing::info!(
            dir = %log_dir.display(),
            files = insights.files_scanned,
            events = insights.event_count,
            sessions = insights.session_count,
            skipped_lines = insights.skipped_lines,
            "Aggregated hook logs"
        );
        insights
    }

    /// Log files directly in `log_dir`, sorted by path.
    ///
    /// A missing directory yields an empty list.
    pub fn discover_files(&self, log_dir: &Path) -> Result<Vec<PathBuf>> {
        if !log_dir.is_dir() {
            tracing::debug!(dir = %log_dir.display(), "Log directory does not exist");
            return Ok(vec![]);
        }

        let pattern = format!(
            "{}/*{}",
            glob::Pattern::escape(&log_dir.to_string_lossy()),
            glob::Pattern::escape(&self.extension)
        );

        let mut files: Vec<PathBuf> = glob::glob(&pattern)?
            .flatten()
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Running totals while files are being read.
struct InsightsFold {
    insights: AggregateInsights,
    sessions: HashSet<String>,
    paths: PathCounter,
}

impl InsightsFold {
    fn new() -> Self {
        Self {
            insights: AggregateInsights::empty(Utc::now()),
            sessions: HashSet::new(),
            paths: PathCounter::new(),
        }
    }

    fn read_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        self.insights.files_scanned += 1;

        let mut malformed = 0u64;
        for chunk in BufReader::new(file).split(b'\n') {
            let bytes = chunk?;
            let Ok(line) = std::str::from_utf8(&bytes) else {
                malformed += 1;
                continue;
            };
            match parse_line(line) {
                Ok(event) => self.record(event),
                Err(LineSkip::Blank) => {}
                Err(LineSkip::Malformed(reason)) => {
                    malformed += 1;
                    tracing::trace!(path = %path.display(), %reason, "Skipping malformed line");
                }
            }
        }

        if malformed > 0 {
            tracing::debug!(
                path = %path.display(),
                lines = malformed,
                "Skipped malformed lines"
            );
        }
        self.insights.skipped_lines += malformed;
        Ok(())
    }

    fn record(&mut self, event: LogEvent) {
        let insights = &mut self.insights;
        insights.event_count += 1;
        match event.event_kind {
            EventKind::PreAction => insights.pre_action_count += 1,
            EventKind::PostAction => insights.post_action_count += 1,
        }
        *insights.tool_usage.entry(event.actor).or_insert(0) += 1;

        for path in extract_paths(&event.detail_preview) {
            self.paths.record(path);
        }

        if insights
            .latest_event_at
            .as_deref()
            .map_or(true, |latest| event.timestamp.as_str() > latest)
        {
            insights.latest_event_at = Some(event.timestamp);
        }

        self.sessions.insert(event.session_id);
    }

    fn finish(mut self, top_k: usize, generated_at: chrono::DateTime<Utc>) -> AggregateInsights {
        self.insights.session_count = self.sessions.len() as u64;
        self.insights.common_paths = self.paths.top(top_k);
        self.insights.generated_at = generated_at;
        self.insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn event_line(actor: &str, session: &str, detail: &str) -> String {
        serde_json::json!({
            "timestamp": "2025-06-01T10:00:00Z",
            "event_kind": "pre_action",
            "actor": actor,
            "session_id": session,
            "detail_preview": detail,
        })
        .to_string()
    }

    #[test]
    fn test_missing_directory_yields_empty_insights() {
        let dir = TempDir::new().unwrap();
        let insights = LogAggregator::default().aggregate(&dir.path().join("nope"));
        assert!(insights.is_empty());
        assert!(insights.tool_usage.is_empty());
        assert!(insights.common_paths.is_empty());
        assert_eq!(insights.session_count, 0);
        assert_eq!(insights.files_scanned, 0);
    }

    #[test]
    fn test_counts_tools_and_sessions() {
        let dir = TempDir::new().unwrap();
        let lines = [
            event_line("Read", "s1", "src/a.rs"),
            event_line("Read", "s1", "src/a.rs"),
            event_line("Bash", "s1", "ls"),
        ];
        fs::write(dir.path().join("a.jsonl"), lines.join("\n")).unwrap();

        let insights = LogAggregator::default().aggregate(dir.path());
        assert_eq!(insights.tool_usage.get("Read"), Some(&2));
        assert_eq!(insights.tool_usage.get("Bash"), Some(&1));
        assert_eq!(insights.session_count, 1);
        assert_eq!(insights.event_count, 3);
        assert_eq!(insights.common_paths, vec!["src/a.rs"]);
    }

    #[test]
    fn test_malformed_lines_do_not_abort_file() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        content.push_str(&event_line("Read", "s1", ""));
        content.push_str("\n{broken\n\n");
        content.push_str(&event_line("Edit", "s2", ""));
        content.push('\n');
        fs::write(dir.path().join("a.jsonl"), content).unwrap();

        let mut bytes = event_line("Grep", "s3", "").into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe not utf8\n");
        fs::write(dir.path().join("b.jsonl"), bytes).unwrap();

        let insights = LogAggregator::default().aggregate(dir.path());
        assert_eq!(insights.event_count, 3);
        assert_eq!(insights.skipped_lines, 2);
        assert_eq!(insights.session_count, 3);
        assert_eq!(insights.files_scanned, 2);
    }

    #[test]
    fn test_only_direct_files_with_extension_are_read() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jsonl"), event_line("Read", "s1", "")).unwrap();
        fs::write(dir.path().join("notes.txt"), event_line("Bash", "s1", "")).unwrap();
        fs::create_dir(dir.path().join("nested.jsonl")).unwrap();
        fs::write(
            dir.path().join("nested.jsonl").join("c.jsonl"),
            event_line("Write", "s1", ""),
        )
        .unwrap();

        let insights = LogAggregator::default().aggregate(dir.path());
        assert_eq!(insights.tool_usage.len(), 1);
        assert_eq!(insights.tool_usage.get("Read"), Some(&1));
        assert_eq!(insights.files_scanned, 1);
    }

    #[test]
    fn test_custom_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), event_line("Read", "s1", "")).unwrap();
        fs::write(dir.path().join("b.jsonl"), event_line("Bash", "s1", "")).unwrap();

        let insights = LogAggregator::new(5)
            .with_extension("log")
            .aggregate(dir.path());
        assert_eq!(insights.tool_usage.keys().collect::<Vec<_>>(), vec!["Read"]);
    }

    #[test]
    fn test_common_paths_tie_break_follows_sorted_file_order() {
        let dir = TempDir::new().unwrap();
        // Written out of order; b.jsonl must still be read after a.jsonl.
        fs::write(dir.path().join("b.jsonl"), event_line("Read", "s1", "z/late.rs")).unwrap();
        fs::write(dir.path().join("a.jsonl"), event_line("Read", "s1", "y/early.rs")).unwrap();

        let insights = LogAggregator::new(1).aggregate(dir.path());
        assert_eq!(insights.common_paths, vec!["y/early.rs"]);
    }

    #[test]
    fn test_latest_event_is_greatest_timestamp() {
        let dir = TempDir::new().unwrap();
        let lines = [
            r#"{"timestamp":"2025-06-02T00:00:00Z","event_kind":"pre_action","actor":"Read","session_id":"s"}"#,
            r#"{"timestamp":"2025-06-03T00:00:00Z","event_kind":"post_action","actor":"Read","session_id":"s"}"#,
            r#"{"timestamp":"2025-06-01T00:00:00Z","event_kind":"pre_action","actor":"Read","session_id":"s"}"#,
        ];
        fs::write(dir.path().join("a.jsonl"), lines.join("\n")).unwrap();

        let insights = LogAggregator::default().aggregate(dir.path());
        assert_eq!(
            insights.latest_event_at.as_deref(),
            Some("2025-06-03T00:00:00Z")
        );
        assert_eq!(insights.pre_action_count, 2);
        assert_eq!(insights.post_action_count, 1);
    }
}
