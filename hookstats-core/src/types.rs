//! Core domain types for hookstats
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One line of a hook log: a tool about to run, or a tool that finished |
//! | **Actor** | The tool or operation an event is about (Bash, Read, Edit, ...) |
//! | **Session** | A group of events emitted by one execution session |
//! | **Insights** | Aggregate statistics folded from every event in the log directory |
//! | **Managed document** | A free-form text file with a region bounded by two marker lines |
//! | **Log root** | The only directory tree the retention cleaner may delete from |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================
// Events
// ============================================

/// Whether an event was logged before or after the tool ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Logged before the tool runs
    PreAction,
    /// Logged after the tool completes
    PostAction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PreAction => "pre_action",
            EventKind::PostAction => "post_action",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    /// Accepts the canonical names as well as the hook event names
    /// (`PreToolUse` / `PostToolUse`) and the short forms `pre` / `post`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_action" | "PreToolUse" | "pre" => Ok(EventKind::PreAction),
            "post_action" | "PostToolUse" | "post" => Ok(EventKind::PostAction),
            _ => Err(format!("unknown event kind: {}", s)),
        }
    }
}

/// One parsed line from a log file.
///
/// Constructed per line and discarded once folded into [`AggregateInsights`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Opaque, sortable timestamp as written by the logger
    pub timestamp: String,
    pub event_kind: EventKind,
    /// Tool or operation name
    pub actor: String,
    pub session_id: String,
    /// Free-text excerpt of the tool input (may contain paths)
    pub detail_preview: String,
}

// ============================================
// Insights
// ============================================

/// Aggregate usage statistics over every event in the log directory.
///
/// The default value is the valid "nothing observed yet" result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateInsights {
    /// Occurrences per actor name
    pub tool_usage: BTreeMap<String, u64>,
    /// Top-K path-like tokens from `detail_preview`, most frequent first
    pub common_paths: Vec<String>,
    /// Number of distinct session ids
    pub session_count: u64,
    /// Number of records that parsed successfully
    pub event_count: u64,
    pub pre_action_count: u64,
    pub post_action_count: u64,
    /// Lines that were malformed, incomplete, or not UTF-8
    pub skipped_lines: u64,
    /// Number of log files read
    pub files_scanned: u64,
    /// Greatest event timestamp observed
    pub latest_event_at: Option<String>,
    /// When this aggregation ran
    pub generated_at: DateTime<Utc>,
}

impl Default for AggregateInsights {
    fn default() -> Self {
        Self::empty(Utc::now())
    }
}

impl AggregateInsights {
    /// All-zero insights stamped with `generated_at`.
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            tool_usage: BTreeMap::new(),
            common_paths: Vec::new(),
            session_count: 0,
            event_count: 0,
            pre_action_count: 0,
            post_action_count: 0,
            skipped_lines: 0,
            files_scanned: 0,
            latest_event_at: None,
            generated_at,
        }
    }

    /// True when no event has been observed.
    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    /// Serialize as one JSON value, optionally pretty-printed.
    pub fn to_json(&self, pretty: bool) -> crate::error::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Tools sorted by count descending, ties broken by name ascending.
    pub fn ranked_tools(&self) -> Vec<(&str, u64)> {
        let mut tools: Vec<(&str, u64)> = self
            .tool_usage
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tools
    }
}

// ============================================
// Managed document
// ============================================

/// A text file holding a region delimited by two marker lines.
///
/// Everything before the start marker and after the end marker belongs to
/// whoever edits the file by hand and is never changed by hookstats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDocument {
    pub path: PathBuf,
    pub start_marker: String,
    pub end_marker: String,
}

impl ManagedDocument {
    pub fn new(
        path: impl Into<PathBuf>,
        start_marker: impl Into<String>,
        end_marker: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }
}

/// Outcome of a region update. `applied == false` is an expected result,
/// with the document left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub applied: bool,
    /// Human-readable explanation; also carries non-blocking warnings
    pub reason: String,
    /// Backup written before the replace, if any
    pub backup_path: Option<PathBuf>,
    /// Set when the update went ahead but the backup copy failed
    pub backup_error: Option<String>,
}

impl UpdateResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            applied: false,
            reason: reason.into(),
            backup_path: None,
            backup_error: None,
        }
    }
}

// ============================================
// Retention
// ============================================

/// Which log files may be retired, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Directory the log files live in (must resolve under the log root)
    pub directory: PathBuf,
    /// File name suffix, e.g. `.jsonl`
    pub extension_filter: String,
    /// Files strictly older than this are deleted
    pub max_age: chrono::Duration,
}

/// A file the cleaner did not delete, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanResult {
    /// Deleted files (or, in a dry run, files that would be deleted)
    pub deleted: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
    /// Matching files young enough to keep
    pub kept: usize,
    /// Size of the deleted files
    pub bytes_reclaimed: u64,
}

impl CleanResult {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.skipped.is_empty() && self.kept == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_str() {
        assert_eq!("pre_action".parse::<EventKind>(), Ok(EventKind::PreAction));
        assert_eq!("PostToolUse".parse::<EventKind>(), Ok(EventKind::PostAction));
        assert_eq!("pre".parse::<EventKind>(), Ok(EventKind::PreAction));
        assert!("during".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_ranked_tools_breaks_ties_alphabetically() {
        let mut insights = AggregateInsights::default();
        insights.tool_usage.insert("Read".to_string(), 3);
        insights.tool_usage.insert("Bash".to_string(), 1);
        insights.tool_usage.insert("Edit".to_string(), 3);
        insights.tool_usage.insert("Agent".to_string(), 1);

        let ranked = insights.ranked_tools();
        assert_eq!(
            ranked,
            vec![("Edit", 3), ("Read", 3), ("Agent", 1), ("Bash", 1)]
        );
    }

    #[test]
    fn test_empty_insights() {
        let insights = AggregateInsights::default();
        assert!(insights.is_empty());
        assert!(insights.tool_usage.is_empty());
        assert!(insights.common_paths.is_empty());
        assert_eq!(insights.session_count, 0);
        assert!(insights.latest_event_at.is_none());
    }

    #[test]
    fn test_to_json_compact_and_pretty() {
        let mut insights = AggregateInsights::default();
        insights.tool_usage.insert("Read".to_string(), 2);
        insights.event_count = 2;

        let compact = insights.to_json(false).unwrap();
        let pretty = insights.to_json(true).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));

        let back: AggregateInsights = serde_json::from_str(&pretty).unwrap();
        assert_eq!(back, insights);
    }

    #[test]
    fn test_insights_serialize_with_stable_key_order() {
        let mut insights = AggregateInsights::empty(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        insights.tool_usage.insert("Read".to_string(), 2);
        insights.tool_usage.insert("Bash".to_string(), 1);

        let json = serde_json::to_string(&insights).unwrap();
        let bash = json.find("\"Bash\"").unwrap();
        let read = json.find("\"Read\"").unwrap();
        assert!(bash < read);
        assert!(json.contains("\"generated_at\":\"2025-01-01T00:00:00Z\""));
    }
}
