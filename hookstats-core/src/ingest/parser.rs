//! Hook log record parsing
//!
//! Each line of a log file is one JSON object. Parsing is deliberately
//! forgiving about field names (hook loggers disagree on them) and strict
//! about content: a record must name its event kind, actor and session or
//! the line is skipped.

use crate::types::{EventKind, LogEvent};
use serde::Deserialize;

/// Represents a single line of a hook log, before validation.
///
/// Uses `#[serde(default)]` so missing fields surface as `None` and are
/// rejected in [`parse_line`] instead of failing deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRecord {
    #[serde(alias = "ts", alias = "time")]
    timestamp: Option<serde_json::Value>,
    #[serde(alias = "event", alias = "hook_event_name")]
    event_kind: Option<String>,
    #[serde(alias = "tool", alias = "tool_name")]
    actor: Option<String>,
    #[serde(alias = "session")]
    session_id: Option<String>,
    #[serde(alias = "input_preview", alias = "detail")]
    detail_preview: Option<String>,
}

/// Why a line produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSkip {
    /// Blank line; not counted as malformed
    Blank,
    /// Anything else: bad JSON, missing or unusable fields
    Malformed(String),
}

/// Parse one log line into a [`LogEvent`].
pub fn parse_line(line: &str) -> std::result::Result<LogEvent, LineSkip> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineSkip::Blank);
    }

    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| LineSkip::Malformed(e.to_string()))?;

    let timestamp = match raw.timestamp {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(LineSkip::Malformed("missing timestamp".to_string())),
    };

    let event_kind = raw
        .event_kind
        .ok_or_else(|| LineSkip::Malformed("missing event kind".to_string()))?
        .parse::<EventKind>()
        .map_err(LineSkip::Malformed)?;

    let actor = non_empty(raw.actor, "actor")?;
    let session_id = non_empty(raw.session_id, "session_id")?;

    Ok(LogEvent {
        timestamp,
        event_kind,
        actor,
        session_id,
        detail_preview: raw.detail_preview.unwrap_or_default(),
    })
}

fn non_empty(value: Option<String>, field: &str) -> std::result::Result<String, LineSkip> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LineSkip::Malformed(format!("missing {}", field))),
    }
}
