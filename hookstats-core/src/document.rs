//! Safe replacement of the marker-delimited region of a managed document.
//!
//! ## Guarantees
//!
//! - Bytes before the start marker line and after the end marker line are
//!   copied through untouched, line endings included.
//! - The document is replaced by renaming a fully written, re-verified
//!   sibling temp file over it; it is never truncated in place. A reader (or
//!   a crash) observes either the old content or the new content.
//! - Every failure leaves the document byte-for-byte unchanged and is
//!   reported through [`UpdateResult`], never as an error.
//!
//! Concurrent runs are not locked against each other: the last rename wins,
//! and either outcome is a complete, valid document.

use crate::types::{AggregateInsights, ManagedDocument, UpdateResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default suffix appended to the document file name for the backup copy.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

const TEMP_SUFFIX: &str = "hookstats-tmp";

/// Why an update was not applied. The `Display` text becomes
/// [`UpdateResult::reason`].
#[derive(Debug, Error)]
enum UpdateSkip {
    #[error("document {path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("start marker {marker:?} not found")]
    MissingStartMarker { marker: String },

    #[error("end marker {marker:?} not found")]
    MissingEndMarker { marker: String },

    #[error("end marker {end:?} does not appear after start marker {start:?}")]
    MarkersOutOfOrder { start: String, end: String },

    #[error("failed to write temporary file {path}: {source}")]
    TempWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rendered document failed verification: {0}")]
    Verification(String),

    #[error("failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Line indices of the two markers within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start_line: usize,
    pub end_line: usize,
}

/// Replaces the managed region of a document with freshly rendered content.
#[derive(Debug, Clone)]
pub struct RegionUpdater {
    backup_suffix: String,
}

impl Default for RegionUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionUpdater {
    pub fn new() -> Self {
        Self {
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    /// Sibling path the original document is copied to before replacement.
    ///
    /// [`RegionUpdater::update`] derives it from the configured document
    /// path, so a symlinked document gets its backup beside the link while
    /// the link's target is what gets replaced.
    pub fn backup_path(&self, doc_path: &Path) -> PathBuf {
        let mut name = doc_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(&self.backup_suffix);
        doc_path.with_file_name(name)
    }

    /// Render `insights` with `render` and swap the result into the region.
    ///
    /// `render` must produce the whole block, start and end marker lines
    /// included. Never fails; see [`UpdateResult`].
    pub fn update<F>(
        &self,
        doc: &ManagedDocument,
        insights: &AggregateInsights,
        render: F,
    ) -> UpdateResult
    where
        F: FnOnce(&AggregateInsights) -> String,
    {
        match self.try_update(doc, insights, render) {
            Ok(result) => {
                tracing::info!(
                    path = %doc.path.display(),
                    reason = %result.reason,
                    "Managed region updated"
                );
                result
            }
            Err(skip) => {
                tracing::warn!(
                    path = %doc.path.display(),
                    reason = %skip,
                    "Managed region not updated"
                );
                UpdateResult::skipped(skip.to_string())
            }
        }
    }

    fn try_update<F>(
        &self,
        doc: &ManagedDocument,
        insights: &AggregateInsights,
        render: F,
    ) -> std::result::Result<UpdateResult, UpdateSkip>
    where
        F: FnOnce(&AggregateInsights) -> String,
    {
        // Write through symlinks so the link itself survives the rename.
        let target = fs::canonicalize(&doc.path).unwrap_or_else(|_| doc.path.clone());

        let original = fs::read_to_string(&target).map_err(|source| UpdateSkip::Unreadable {
            path: doc.path.clone(),
            source,
        })?;

        let lines: Vec<&str> = original.split_inclusive('\n').collect();
        let region = locate_region(&lines, &doc.start_marker, &doc.end_marker)?;

        let rendered = render(insights);
        let updated = splice(&lines, region, &rendered);
        verify(&updated, &doc.start_marker, &doc.end_marker)?;

        if updated == original {
            return Ok(UpdateResult {
                applied: true,
                reason: "region already up to date".to_string(),
                backup_path: None,
                backup_error: None,
            });
        }

        let temp = TempFile::write_beside(&target, &updated)?;
        let written = fs::read_to_string(temp.path()).map_err(|source| UpdateSkip::TempWrite {
            path: temp.path().to_path_buf(),
            source,
        })?;
        verify(&written, &doc.start_marker, &doc.end_marker)?;

        if let Ok(metadata) = fs::metadata(&target) {
            if let Err(e) = fs::set_permissions(temp.path(), metadata.permissions()) {
                tracing::debug!(
                    path = %temp.path().display(),
                    error = %e,
                    "Failed to copy document permissions to temp file"
                );
            }
        }

        // Next to the configured path, even when it is a symlink.
        let backup = self.backup_path(&doc.path);
        let (backup_path, backup_error) = match fs::copy(&target, &backup) {
            Ok(_) => (Some(backup), None),
            Err(e) => {
                tracing::warn!(
                    backup = %backup.display(),
                    error = %e,
                    "Failed to write backup, continuing"
                );
                (None, Some(format!("backup {} failed: {}", backup.display(), e)))
            }
        };

        temp.persist(&target)?;

        let reason = match &backup_error {
            Some(error) => format!("region updated; {}", error),
            None => "region updated".to_string(),
        };
        Ok(UpdateResult {
            applied: true,
            reason,
            backup_path,
            backup_error,
        })
    }
}

/// Whether `line` (with or without its line ending) is exactly `marker`.
///
/// Trailing whitespace is ignored on both sides.
fn is_marker(line: &str, marker: &str) -> bool {
    line.trim_end() == marker.trim_end()
}

/// Find the first start marker and the first end marker at or after it.
fn locate_region(
    lines: &[&str],
    start_marker: &str,
    end_marker: &str,
) -> std::result::Result<Region, UpdateSkip> {
    let start_line = lines
        .iter()
        .position(|line| is_marker(line, start_marker))
        .ok_or_else(|| UpdateSkip::MissingStartMarker {
            marker: start_marker.to_string(),
        })?;

    if !lines.iter().any(|line| is_marker(line, end_marker)) {
        return Err(UpdateSkip::MissingEndMarker {
            marker: end_marker.to_string(),
        });
    }

    let end_line = lines[start_line..]
        .iter()
        .position(|line| is_marker(line, end_marker))
        .map(|offset| start_line + offset)
        .filter(|&end_line| end_line > start_line)
        .ok_or_else(|| UpdateSkip::MarkersOutOfOrder {
            start: start_marker.to_string(),
            end: end_marker.to_string(),
        })?;

    Ok(Region {
        start_line,
        end_line,
    })
}

/// Public view of marker location, for diagnostics and tests.
pub fn find_region(content: &str, start_marker: &str, end_marker: &str) -> Option<Region> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    locate_region(&lines, start_marker, end_marker).ok()
}

/// `lines[..start] + rendered + lines[end + 1..]`.
///
/// The rendered block takes over the end marker line's terminator, so a
/// CRLF document stays CRLF and a document without a final newline keeps
/// not having one.
fn splice(lines: &[&str], region: Region, rendered: &str) -> String {
    let terminator = line_ending(lines[region.end_line]);
    let body = rendered.trim_end_matches(['\n', '\r']);
    let body = if terminator == "\r\n" {
        body.replace("\r\n", "\n").replace('\n', "\r\n")
    } else {
        body.to_string()
    };

    let mut out = String::with_capacity(lines.iter().map(|l| l.len()).sum::<usize>() + body.len());
    for line in &lines[..region.start_line] {
        out.push_str(line);
    }
    out.push_str(&body);
    out.push_str(terminator);
    for line in &lines[region.end_line + 1..] {
        out.push_str(line);
    }
    out
}

fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Exactly one start marker, exactly one end marker, start before end.
fn verify(
    content: &str,
    start_marker: &str,
    end_marker: &str,
) -> std::result::Result<(), UpdateSkip> {
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for (index, line) in content.split_inclusive('\n').enumerate() {
        if is_marker(line, start_marker) {
            starts.push(index);
        }
        if is_marker(line, end_marker) {
            ends.push(index);
        }
    }

    match (starts.as_slice(), ends.as_slice()) {
        ([start], [end]) if start < end => Ok(()),
        ([_], [_]) => Err(UpdateSkip::Verification(
            "end marker precedes start marker".to_string(),
        )),
        _ => Err(UpdateSkip::Verification(format!(
            "expected one start and one end marker, found {} and {}",
            starts.len(),
            ends.len()
        ))),
    }
}

/// A temp file next to its eventual destination; removed on drop unless
/// persisted.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn write_beside(target: &Path, content: &str) -> std::result::Result<Self, UpdateSkip> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let path = dir.join(format!(".{}.{}.{}", name, uuid::Uuid::new_v4(), TEMP_SUFFIX));

        let temp = TempFile {
            path,
            persisted: false,
        };

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp.path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|source| UpdateSkip::TempWrite {
            path: temp.path.clone(),
            source,
        })?;

        Ok(temp)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename over `target`.
    fn persist(mut self, target: &Path) -> std::result::Result<(), UpdateSkip> {
        fs::rename(&self.path, target).map_err(|source| UpdateSkip::Replace {
            path: target.to_path_buf(),
            source,
        })?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            // Best-effort; a leftover temp file never affects the document.
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MarkdownRenderer;
    use tempfile::TempDir;

    const START: &str = "<!-- start -->";
    const END: &str = "<!-- end -->";

    fn document(dir: &TempDir, content: &str) -> ManagedDocument {
        let path = dir.path().join("NOTES.md");
        fs::write(&path, content).unwrap();
        ManagedDocument::new(path, START, END)
    }

    fn insights_with(tool: &str, count: u64) -> AggregateInsights {
        let mut insights = AggregateInsights::default();
        insights.tool_usage.insert(tool.to_string(), count);
        insights.event_count = count;
        insights.session_count = 1;
        insights
    }

    fn render(insights: &AggregateInsights) -> String {
        MarkdownRenderer::new(START, END).render(insights)
    }

    fn temp_files(dir: &TempDir) -> Vec<PathBuf> {
        fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect()
    }

    #[test]
    fn test_update_preserves_prefix_and_suffix() {
        let dir = TempDir::new().unwrap();
        let prefix = "# Notes\n\nHand written intro.\n";
        let suffix = "\n## Later\nMore text, no trailing newline";
        let doc = document(&dir, &format!("{prefix}{START}\nold stuff\n{END}\n{suffix}"));

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 2), render);
        assert!(result.applied, "{}", result.reason);

        let content = fs::read_to_string(&doc.path).unwrap();
        assert!(content.starts_with(prefix));
        assert!(content.ends_with(&format!("{END}\n{suffix}")));
        assert!(content.contains("| Read | 2 |"));
        assert!(!content.contains("old stuff"));
        assert!(temp_files(&dir).is_empty());
    }

    #[test]
    fn test_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let doc = document(&dir, &format!("intro\n{START}\n{END}\noutro\n"));
        let insights = insights_with("Bash", 4);
        let updater = RegionUpdater::new();

        assert!(updater.update(&doc, &insights, render).applied);
        let first = fs::read_to_string(&doc.path).unwrap();

        let second_result = updater.update(&doc, &insights, render);
        assert!(second_result.applied);
        assert_eq!(second_result.reason, "region already up to date");
        let second = fs::read_to_string(&doc.path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_end_marker_is_noop() {
        let dir = TempDir::new().unwrap();
        let original = format!("intro\n{START}\nbody\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(!result.applied);
        assert!(result.reason.contains("end marker"));
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
        assert!(!RegionUpdater::new().backup_path(&doc.path).exists());
    }

    #[test]
    fn test_missing_start_marker_is_noop() {
        let dir = TempDir::new().unwrap();
        let original = format!("intro\n{END}\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(!result.applied);
        assert!(result.reason.contains("start marker"));
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
    }

    #[test]
    fn test_misordered_markers_are_noop() {
        let dir = TempDir::new().unwrap();
        let original = format!("{END}\nmiddle\n{START}\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(!result.applied);
        assert!(result.reason.contains("does not appear after"));
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
    }

    #[test]
    fn test_missing_document_is_noop() {
        let dir = TempDir::new().unwrap();
        let doc = ManagedDocument::new(dir.path().join("absent.md"), START, END);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(!result.applied);
        assert!(result.reason.contains("not readable"));
        assert!(!doc.path.exists());
    }

    #[test]
    fn test_renderer_without_markers_fails_verification() {
        let dir = TempDir::new().unwrap();
        let original = format!("{START}\n{END}\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), |_| {
            "no markers\n".to_string()
        });
        assert!(!result.applied);
        assert!(result.reason.contains("verification"));
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
        assert!(temp_files(&dir).is_empty());
    }

    #[test]
    fn test_duplicate_marker_outside_region_fails_verification() {
        let dir = TempDir::new().unwrap();
        let original = format!("{START}\n{END}\nquoted again:\n{START}\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(!result.applied);
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
    }

    #[test]
    fn test_backup_holds_previous_content() {
        let dir = TempDir::new().unwrap();
        let original = format!("{START}\nprevious\n{END}\n");
        let doc = document(&dir, &original);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);
        assert!(result.applied);
        let backup = result.backup_path.unwrap();
        assert_eq!(backup.file_name().unwrap(), "NOTES.md.bak");
        assert_eq!(fs::read_to_string(backup).unwrap(), original);
    }

    #[test]
    fn test_crlf_documents_stay_crlf() {
        let dir = TempDir::new().unwrap();
        let doc = document(&dir, &format!("intro\r\n{START}\r\n{END}\r\noutro\r\n"));

        assert!(RegionUpdater::new()
            .update(&doc, &insights_with("Read", 1), render)
            .applied);

        let content = fs::read_to_string(&doc.path).unwrap();
        assert!(content.starts_with("intro\r\n"));
        assert!(content.ends_with(&format!("{END}\r\noutro\r\n")));
        assert!(!content.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_markers_with_trailing_whitespace_match() {
        let dir = TempDir::new().unwrap();
        let doc = document(&dir, &format!("{START}   \nold\n{END}\t\n"));

        assert!(RegionUpdater::new()
            .update(&doc, &insights_with("Read", 1), render)
            .applied);
        assert!(!fs::read_to_string(&doc.path).unwrap().contains("old"));
    }

    #[test]
    fn test_find_region_uses_first_end_after_start() {
        let content = format!("{END}\n{START}\na\n{END}\nb\n{END}\n");
        let region = find_region(&content, START, END).unwrap();
        assert_eq!(
            region,
            Region {
                start_line: 1,
                end_line: 3
            }
        );
    }

    #[test]
    fn test_custom_backup_suffix() {
        let updater = RegionUpdater::new().with_backup_suffix("~");
        assert_eq!(
            updater.backup_path(Path::new("/docs/CLAUDE.md")),
            PathBuf::from("/docs/CLAUDE.md~")
        );
    }

    #[test]
    fn test_failed_backup_does_not_block_update() {
        let dir = TempDir::new().unwrap();
        let doc = document(&dir, &format!("intro\n{START}\nold\n{END}\n"));
        // A directory where the backup file should go makes the copy fail.
        fs::create_dir(dir.path().join("NOTES.md.bak")).unwrap();

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);

        assert!(result.applied, "{}", result.reason);
        assert!(result.backup_path.is_none());
        let error = result.backup_error.as_deref().unwrap();
        assert!(error.contains("NOTES.md.bak"), "{error}");
        assert!(result.reason.contains("backup"), "{}", result.reason);
        let content = fs::read_to_string(&doc.path).unwrap();
        assert!(content.contains("| Read | 1 |"));
        assert!(!content.contains("old"));
        assert!(temp_files(&dir).is_empty());
    }

    #[test]
    fn test_failed_rename_leaves_document_and_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let original = format!("{START}\nold\n{END}\n");
        let doc = document(&dir, &original);

        let temp = TempFile::write_beside(&doc.path, "replacement\n").unwrap();
        assert_eq!(temp_files(&dir).len(), 1);
        let unreachable = dir.path().join("missing").join("NOTES.md");

        let err = temp.persist(&unreachable).unwrap_err();

        assert!(matches!(err, UpdateSkip::Replace { .. }));
        assert!(err.to_string().starts_with("failed to replace"));
        assert_eq!(fs::read_to_string(&doc.path).unwrap(), original);
        assert!(temp_files(&dir).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_document_keeps_link_and_backs_up_beside_it() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let real = elsewhere.path().join("REAL.md");
        let original = format!("{START}\nold\n{END}\n");
        fs::write(&real, &original).unwrap();
        let link = dir.path().join("NOTES.md");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let doc = ManagedDocument::new(&link, START, END);

        let result = RegionUpdater::new().update(&doc, &insights_with("Read", 1), render);

        assert!(result.applied, "{}", result.reason);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(fs::read_to_string(&real).unwrap().contains("| Read | 1 |"));
        assert_eq!(result.backup_path, Some(dir.path().join("NOTES.md.bak")));
        assert_eq!(
            fs::read_to_string(dir.path().join("NOTES.md.bak")).unwrap(),
            original
        );
        assert!(!elsewhere.path().join("REAL.md.bak").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_survive_replacement() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let doc = document(&dir, &format!("{START}\nold\n{END}\n"));
        fs::set_permissions(&doc.path, fs::Permissions::from_mode(0o640)).unwrap();

        assert!(RegionUpdater::new()
            .update(&doc, &insights_with("Read", 1), render)
            .applied);

        let mode = fs::metadata(&doc.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
