//! Coercion of untrusted backend text into an [`AgentResponse`].
//!
//! Backends are asked for JSON but routinely wrap it in prose or markdown
//! fences, omit fields, or send the wrong types. Every field gets an explicit
//! default so a missing key never fails a round; only text with no parseable
//! object at all is an error.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::{AgentResponse, FileChange, FinishReason};

pub const DEFAULT_THOUGHTS: &str = "No technical thoughts shared.";
pub const DEFAULT_ACTION: &str = "Analysis complete";

/// Slice from the first `{` to the last `}` of `raw`, if both exist in order.
///
/// The match is greedy: braces in prose after the object are swallowed too,
/// which makes the region unparseable rather than silently truncated.
pub fn extract_json_region(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse raw backend text into a normalized response.
pub fn parse_agent_response(raw: &str) -> Result<AgentResponse> {
    if raw.trim().is_empty() {
        bail!("empty response from backend");
    }
    let candidate = extract_json_region(raw).unwrap_or(raw);
    let value: Value = serde_json::from_str(candidate).context("parse backend JSON")?;
    match value {
        Value::Object(object) => Ok(coerce(&object)),
        other => bail!("expected a JSON object, got {}", json_kind(&other)),
    }
}

fn coerce(object: &Map<String, Value>) -> AgentResponse {
    let finish_reason = finish_reason(object.get("finishReason"));
    let mut changes = changes(object.get("changes"));
    if finish_reason == FinishReason::Error && !changes.is_empty() {
        debug!(count = changes.len(), "dropping edits carried by an error response");
        changes.clear();
    }

    AgentResponse {
        thoughts: non_empty_str(object.get("thoughts"))
            .unwrap_or(DEFAULT_THOUGHTS)
            .to_string(),
        read_files: read_files(object.get("readFiles")),
        changes,
        finish_reason,
        current_action: Some(
            non_empty_str(object.get("currentAction"))
                .unwrap_or(DEFAULT_ACTION)
                .to_string(),
        ),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn read_files(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn changes(value: Option<&Value>) -> Vec<FileChange> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let change = item.as_object()?;
            let path = non_empty_str(change.get("path"));
            let content = change.get("content").and_then(Value::as_str);
            let (Some(path), Some(content)) = (path, content) else {
                debug!(entry = %item, "skipping malformed change entry");
                return None;
            };
            Some(FileChange {
                path: path.to_string(),
                content: content.to_string(),
                reason: change
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Missing or blank means `done`; unrecognized values keep the loop going.
fn finish_reason(value: Option<&Value>) -> FinishReason {
    match non_empty_str(value).map(str::trim) {
        None => FinishReason::Done,
        Some(reason) if reason.eq_ignore_ascii_case("done") => FinishReason::Done,
        Some(reason) if reason.eq_ignore_ascii_case("error") => FinishReason::Error,
        Some(reason) => {
            if !reason.eq_ignore_ascii_case("continue") {
                debug!(reason, "unrecognized finishReason, treating as continue");
            }
            FinishReason::Continue
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"thoughts\": \"fixed {it}\", \"finishReason\": \"continue\"}\n```\nThanks";
        let response = parse_agent_response(raw).expect("parse");
        assert_eq!(response.thoughts, "fixed {it}");
        assert_eq!(response.finish_reason, FinishReason::Continue);
    }

    #[test]
    fn region_spans_first_open_to_last_close_brace() {
        assert_eq!(
            extract_json_region("pre {\"a\": 1} mid {b} post"),
            Some("{\"a\": 1} mid {b}")
        );
        assert_eq!(extract_json_region("} backwards {"), None);
        assert_eq!(extract_json_region("no braces"), None);

        let trailing = "{\"thoughts\": \"ok\"}\nNote: use {count} in the label.";
        assert!(parse_agent_response(trailing).is_err());
    }

    #[test]
    fn applies_defaults_for_missing_fields() {
        let response = parse_agent_response("{}").expect("parse");
        assert_eq!(response.thoughts, DEFAULT_THOUGHTS);
        assert!(response.read_files.is_empty());
        assert!(response.changes.is_empty());
        assert_eq!(response.finish_reason, FinishReason::Done);
        assert_eq!(response.current_action.as_deref(), Some(DEFAULT_ACTION));
    }

    #[test]
    fn malformed_field_types_fall_back_to_defaults() {
        let raw = r#"{"thoughts": 42, "readFiles": "src/App.js", "changes": {"path": "x"}, "currentAction": ""}"#;
        let response = parse_agent_response(raw).expect("parse");
        assert_eq!(response.thoughts, DEFAULT_THOUGHTS);
        assert!(response.read_files.is_empty());
        assert!(response.changes.is_empty());
        assert_eq!(response.current_action.as_deref(), Some(DEFAULT_ACTION));
    }

    #[test]
    fn keeps_well_formed_changes_and_skips_broken_ones() {
        let raw = r#"{
            "readFiles": ["src/App.js", 7],
            "changes": [
                {"path": "src/App.js", "content": "new", "reason": "fix"},
                {"path": "src/Missing.js"},
                {"content": "orphan"},
                {"path": "src/Other.js", "content": ""}
            ],
            "finishReason": "continue"
        }"#;
        let response = parse_agent_response(raw).expect("parse");
        assert_eq!(response.read_files, vec!["src/App.js".to_string()]);
        assert_eq!(response.changes.len(), 2);
        assert_eq!(response.changes[0].reason, "fix");
        assert_eq!(response.changes[1].path, "src/Other.js");
        assert_eq!(response.changes[1].reason, "");
    }

    #[test]
    fn error_responses_never_carry_edits() {
        let raw = r#"{"finishReason": "error", "changes": [{"path": "a.js", "content": "x"}]}"#;
        let response = parse_agent_response(raw).expect("parse");
        assert_eq!(response.finish_reason, FinishReason::Error);
        assert!(response.changes.is_empty());
    }

    #[test]
    fn unknown_finish_reason_continues() {
        let response = parse_agent_response(r#"{"finishReason": "stop"}"#).expect("parse");
        assert_eq!(response.finish_reason, FinishReason::Continue);
    }

    #[test]
    fn rejects_empty_and_non_object_text() {
        assert!(parse_agent_response("   ").is_err());
        assert!(parse_agent_response("no json here").is_err());
        let err = parse_agent_response("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("parse backend JSON") || err.to_string().contains("array"));
    }
}
