//! Markdown rendering of [`AggregateInsights`] for the managed region.
//!
//! The rendered block starts with the start marker and ends with the end
//! marker, so a successful update always leaves both markers in place.
//! Output depends only on the aggregated values, never on the wall clock:
//! re-rendering unchanged insights yields identical text.

use crate::types::AggregateInsights;

const HEADING: &str = "## Tool usage insights";

/// Renders insights as a self-contained, marker-delimited Markdown block.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    start_marker: String,
    end_marker: String,
}

impl MarkdownRenderer {
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }

    /// Render the full replacement block, markers included, newline-terminated.
    pub fn render(&self, insights: &AggregateInsights) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(self.start_marker.clone());
        lines.push(HEADING.to_string());
        lines.push(String::new());

        if insights.is_empty() {
            lines.push("_No tool activity observed yet._".to_string());
        } else {
            lines.push(summary_line(insights));
            lines.push(String::new());

            lines.push("| Tool | Uses |".to_string());
            lines.push("|------|-----:|".to_string());
            for (tool, count) in insights.ranked_tools() {
                lines.push(format!("| {} | {} |", escape_cell(tool), count));
            }

            if !insights.common_paths.is_empty() {
                lines.push(String::new());
                lines.push("**Frequently referenced paths**".to_string());
                lines.push(String::new());
                for path in &insights.common_paths {
                    lines.push(format!("- `{}`", path.replace('`', "'")));
                }
            }
        }

        lines.push(self.end_marker.clone());

        let mut block = lines.join("\n");
        block.push('\n');
        block
    }
}

fn summary_line(insights: &AggregateInsights) -> String {
    let mut summary = format!(
        "{} {} across {} {}",
        insights.event_count,
        plural(insights.event_count, "event", "events"),
        insights.session_count,
        plural(insights.session_count, "session", "sessions"),
    );
    if let Some(latest) = &insights.latest_event_at {
        summary.push_str(&format!(" (latest: {})", single_line(latest)));
    }
    summary.push('.');
    summary
}

fn plural<'a>(n: u64, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Values taken from log records must not start new Markdown lines.
fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Keep tool names from breaking the table layout.
fn escape_cell(text: &str) -> String {
    single_line(&text.replace('|', "\\|"))
}
