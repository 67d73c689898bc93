//! TTL retention for hook log files.
//!
//! The cleaner only ever deletes regular files that sit directly inside a
//! directory resolving under the configured log root. Anything else (a
//! directory outside the root, subdirectories, symlinks) is left alone.

use crate::types::{CleanResult, RetentionPolicy, SkippedEntry};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Deletes expired log files, scoped to one sanctioned log root.
#[derive(Debug, Clone)]
pub struct RetentionCleaner {
    log_root: PathBuf,
}

impl RetentionCleaner {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
        }
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Whether `directory` resolves to a path under the log root.
    pub fn is_in_scope(&self, directory: &Path) -> bool {
        self.resolve_in_scope(directory).is_some()
    }

    /// Delete files in `policy.directory` older than `policy.max_age` at `now`.
    ///
    /// With `dry_run`, files are reported in `deleted` but left on disk.
    /// Never fails: per-file problems land in `skipped`, and a directory
    /// outside the log root yields an empty result.
    pub fn clean(&self, policy: &RetentionPolicy, now: DateTime<Utc>, dry_run: bool) -> CleanResult {
        let Some(directory) = self.resolve_in_scope(&policy.directory) else {
            return CleanResult::default();
        };

        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %directory.display(),
                    error = %e,
                    "Failed to list log directory"
                );
                return CleanResult::default();
            }
        };

        let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        paths.sort();

        let mut result = CleanResult::default();
        for path in paths {
            if !matches_extension(&path, &policy.extension_filter) {
                continue;
            }
            self.consider(&path, policy, now, dry_run, &mut result);
        }

        tracing::info!(
            dir = %directory.display(),
            deleted = result.deleted.len(),
            skipped = result.skipped.len(),
            kept = result.kept,
            bytes = result.bytes_reclaimed,
            dry_run,
            "Retention pass complete"
        );
        result
    }

    /// Canonical `directory` if it lies under the canonical log root.
    fn resolve_in_scope(&self, directory: &Path) -> Option<PathBuf> {
        let root = match fs::canonicalize(&self.log_root) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    root = %self.log_root.display(),
                    error = %e,
                    "Log root does not resolve, refusing to clean"
                );
                return None;
            }
        };

        let directory = match fs::canonicalize(directory) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::debug!(
                    dir = %directory.display(),
                    error = %e,
                    "Log directory does not resolve, nothing to clean"
                );
                return None;
            }
        };

        if !directory.starts_with(&root) {
            tracing::warn!(
                dir = %directory.display(),
                root = %root.display(),
                "Log directory is outside the log root, refusing to clean"
            );
            return None;
        }

        Some(directory)
    }

    fn consider(
        &self,
        path: &Path,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        dry_run: bool,
        result: &mut CleanResult,
    ) {
        let skip = |result: &mut CleanResult, reason: String| {
            result.skipped.push(SkippedEntry {
                path: path.to_path_buf(),
                reason,
            });
        };

        // symlink_metadata: never follow a link out of the directory.
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) => return skip(result, format!("failed to read metadata: {}", e)),
        };
        if metadata.is_dir() {
            return skip(result, "is a directory; not descended into".to_string());
        }
        if !metadata.is_file() {
            return skip(result, "not a regular file".to_string());
        }

        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(t) => t.into(),
            Err(e) => return skip(result, format!("failed to read modification time: {}", e)),
        };

        let age = now.signed_duration_since(modified);
        if age <= policy.max_age {
            result.kept += 1;
            return;
        }

        if dry_run {
            tracing::debug!(path = %path.display(), age_hours = age.num_hours(), "Would delete");
        } else if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete log file");
            return skip(result, format!("failed to delete: {}", e));
        } else {
            tracing::debug!(path = %path.display(), age_hours = age.num_hours(), "Deleted");
        }

        result.bytes_reclaimed += metadata.len();
        result.deleted.push(path.to_path_buf());
    }
}

/// `name.jsonl` matches `.jsonl`; a file named exactly `.jsonl` does not.
fn matches_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| name.len() > extension.len() && name.ends_with(extension))
}
