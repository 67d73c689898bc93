//! Aggregate → update → clean, in that order, for one maintenance run.
//!
//! [`Pipeline::run`] returns an [`ExitReport`] rather than a `Result`: a run
//! always completes, and whatever went wrong is listed in
//! [`ExitReport::diagnostics`] for the operator.

use crate::config::Config;
use crate::document::RegionUpdater;
use crate::ingest::LogAggregator;
use crate::render::MarkdownRenderer;
use crate::retention::RetentionCleaner;
use crate::types::{
    AggregateInsights, CleanResult, ManagedDocument, RetentionPolicy, UpdateResult,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the log files
    pub log_dir: PathBuf,
    /// Sanctioned root the cleaner may delete under
    pub log_root: PathBuf,
    /// Log file suffix, e.g. `.jsonl`
    pub extension: String,
    pub top_k: usize,
    pub document: ManagedDocument,
    pub backup_suffix: String,
    pub max_age: chrono::Duration,
    pub skip_cleanup: bool,
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Build from loaded configuration. CLI overrides are applied by the caller.
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_dir: config.logs.dir(),
            log_root: config.logs.root(),
            extension: config.logs.extension_filter(),
            top_k: config.insights.top_k,
            document: ManagedDocument::new(
                config.document.path.clone(),
                config.document.start_marker.clone(),
                config.document.end_marker.clone(),
            ),
            backup_suffix: config.document.backup_suffix.clone(),
            max_age: config.retention.max_age(),
            skip_cleanup: !config.retention.enabled,
            dry_run: false,
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            directory: self.log_dir.clone(),
            extension_filter: self.extension.clone(),
            max_age: self.max_age,
        }
    }
}

/// What a pipeline run did. Always produced, whatever happened.
#[derive(Debug, Clone, Serialize)]
pub struct ExitReport {
    pub insights: AggregateInsights,
    pub update: UpdateResult,
    /// `None` when cleanup was skipped
    pub clean: Option<CleanResult>,
    /// Non-fatal problems, in the order they happened
    pub diagnostics: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExitReport {
    /// Process exit status for this run. Maintenance runs never fail their
    /// scheduler, so this is always 0.
    pub fn exit_code(&self) -> i32 {
        0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let update = if self.update.applied {
            "document updated"
        } else {
            "document unchanged"
        };
        let clean = match &self.clean {
            Some(clean) => format!(
                "{} log file(s) retired, {} kept",
                clean.deleted.len(),
                clean.kept
            ),
            None => "cleanup skipped".to_string(),
        };
        format!(
            "{} event(s) from {} session(s); {}; {}",
            self.insights.event_count, self.insights.session_count, update, clean
        )
    }
}

/// Runs the three maintenance steps over one configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run aggregate, update, then clean.
    ///
    /// A degraded step still feeds the next one: empty insights render a
    /// "nothing observed yet" region, and a skipped update does not stop
    /// cleanup.
    pub fn run(&self) -> ExitReport {
        self.run_at(Utc::now())
    }

    /// [`Pipeline::run`] with an explicit clock for the retention step.
    pub fn run_at(&self, now: DateTime<Utc>) -> ExitReport {
        let config = &self.config;
        let mut diagnostics = Vec::new();

        tracing::info!(
            log_dir = %config.log_dir.display(),
            document = %config.document.path.display(),
            skip_cleanup = config.skip_cleanup,
            dry_run = config.dry_run,
            "Pipeline starting"
        );

        let insights = LogAggregator::new(config.top_k)
            .with_extension(&config.extension)
            .aggregate(&config.log_dir);
        if insights.files_scanned == 0 {
            diagnostics.push(format!(
                "no log files found in {}",
                config.log_dir.display()
            ));
        }
        if insights.skipped_lines > 0 {
            diagnostics.push(format!(
                "skipped {} malformed log line(s)",
                insights.skipped_lines
            ));
        }

        let renderer = MarkdownRenderer::new(
            config.document.start_marker.clone(),
            config.document.end_marker.clone(),
        );
        let update = RegionUpdater::new()
            .with_backup_suffix(config.backup_suffix.clone())
            .update(&config.document, &insights, |insights| renderer.render(insights));
        if !update.applied {
            diagnostics.push(format!("document not updated: {}", update.reason));
        } else if let Some(error) = &update.backup_error {
            diagnostics.push(format!("document updated without backup: {}", error));
        }

        let clean = if config.skip_cleanup {
            tracing::info!("Cleanup skipped");
            None
        } else {
            let policy = config.retention_policy();
            let cleaner = RetentionCleaner::new(&config.log_root);
            if config.log_dir.is_dir() && !cleaner.is_in_scope(&config.log_dir) {
                diagnostics.push(format!(
                    "cleanup refused: {} is not under log root {}",
                    config.log_dir.display(),
                    config.log_root.display()
                ));
            }
            let result = cleaner.clean(&policy, now, config.dry_run);
            for skipped in &result.skipped {
                diagnostics.push(format!(
                    "retention skipped {}: {}",
                    skipped.path.display(),
                    skipped.reason
                ));
            }
            Some(result)
        };

        for diagnostic in &diagnostics {
            tracing::warn!(%diagnostic, "Pipeline diagnostic");
        }

        let report = ExitReport {
            insights,
            update,
            clean,
            diagnostics,
            started_at: now,
            finished_at: Utc::now(),
        };
        tracing::info!(summary = %report.summary(), "Pipeline finished");
        report
    }
}
