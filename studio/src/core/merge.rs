//! Merge rule for applying a backend round to project state.

use tracing::warn;

use crate::core::paths::safe_relative;
use crate::core::types::{AgentResponse, ConversationEntry, EntryMeta, ProjectFileSet};

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Paths written this round, in response order (duplicates kept).
    pub edited_paths: Vec<String>,
    /// The most recently touched path, which becomes the focused file.
    pub focus: Option<String>,
}

/// Upsert every change of `response` into `files`.
///
/// Error responses are a contract violation if they carry edits; such edits
/// are dropped rather than applied. Changes whose path is absolute, empty, or
/// climbs out of the project are skipped and never reported as edited.
pub fn merge_changes(files: &mut ProjectFileSet, response: &AgentResponse) -> MergeSummary {
    if response.is_error() {
        if !response.changes.is_empty() {
            warn!(
                count = response.changes.len(),
                "ignoring edits attached to an error response"
            );
        }
        return MergeSummary::default();
    }

    let mut summary = MergeSummary::default();
    for change in &response.changes {
        if let Err(err) = safe_relative(&change.path) {
            warn!(error = %err, "skipping edit with unsafe path");
            continue;
        }
        files.upsert(change.path.clone(), change.content.clone());
        summary.edited_paths.push(change.path.clone());
        summary.focus = Some(change.path.clone());
    }
    summary
}

/// The assistant entry recording a round, or `None` when the backend gave no
/// rationale (edits without commentary stay silent).
pub fn assistant_entry(
    response: &AgentResponse,
    summary: &MergeSummary,
    backend: &str,
) -> Option<ConversationEntry> {
    if response.thoughts.trim().is_empty() {
        return None;
    }
    Some(ConversationEntry::assistant(
        response.thoughts.clone(),
        EntryMeta {
            read_files: response.read_files.clone(),
            edited_files: summary.edited_paths.clone(),
            backend: Some(backend.to_string()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FileChange, FinishReason, Role};

    fn response(finish_reason: FinishReason, changes: Vec<FileChange>) -> AgentResponse {
        AgentResponse {
            thoughts: "reasoning".to_string(),
            read_files: vec!["src/App.js".to_string()],
            changes,
            finish_reason,
            current_action: None,
        }
    }

    #[test]
    fn merging_into_empty_project_creates_file_with_language() {
        let mut files = ProjectFileSet::new();
        let summary = merge_changes(
            &mut files,
            &response(FinishReason::Continue, vec![FileChange::new("src/Foo.tsx", "X")]),
        );

        assert_eq!(files.len(), 1);
        let file = files.get("src/Foo.tsx").expect("file");
        assert_eq!(file.content, "X");
        assert_eq!(file.language, "tsx");
        assert_eq!(summary.focus.as_deref(), Some("src/Foo.tsx"));
    }

    #[test]
    fn path_without_extension_gets_text_language() {
        let mut files = ProjectFileSet::new();
        merge_changes(
            &mut files,
            &response(FinishReason::Done, vec![FileChange::new("Makefile", "all:")]),
        );
        assert_eq!(files.get("Makefile").expect("file").language, "text");
    }

    #[test]
    fn last_touched_path_takes_focus() {
        let mut files: ProjectFileSet = [("src/App.js", "old")].into_iter().collect();
        let summary = merge_changes(
            &mut files,
            &response(
                FinishReason::Continue,
                vec![
                    FileChange::new("src/App.js", "new"),
                    FileChange::new("src/Button.js", "btn"),
                ],
            ),
        );

        assert_eq!(files.get("src/App.js").expect("file").content, "new");
        assert_eq!(summary.edited_paths, vec!["src/App.js", "src/Button.js"]);
        assert_eq!(summary.focus.as_deref(), Some("src/Button.js"));
    }

    #[test]
    fn unsafe_paths_are_skipped_and_never_focused() {
        let mut files: ProjectFileSet = [("src/App.js", "old")].into_iter().collect();
        let summary = merge_changes(
            &mut files,
            &response(
                FinishReason::Continue,
                vec![
                    FileChange::new("src/App.js", "new"),
                    FileChange::new("../../etc/passwd", "x"),
                    FileChange::new("/abs.js", "y"),
                    FileChange::new("", "z"),
                ],
            ),
        );

        assert_eq!(files.len(), 1);
        assert_eq!(files.get("src/App.js").expect("file").content, "new");
        assert_eq!(summary.edited_paths, vec!["src/App.js"]);
        assert_eq!(summary.focus.as_deref(), Some("src/App.js"));
    }

    #[test]
    fn error_response_edits_are_dropped() {
        let mut files: ProjectFileSet = [("src/App.js", "old")].into_iter().collect();
        let summary = merge_changes(
            &mut files,
            &response(FinishReason::Error, vec![FileChange::new("src/App.js", "bad")]),
        );

        assert_eq!(files.get("src/App.js").expect("file").content, "old");
        assert_eq!(summary, MergeSummary::default());
    }

    #[test]
    fn assistant_entry_records_round_metadata() {
        let resp = response(FinishReason::Continue, vec![FileChange::new("a.js", "x")]);
        let summary = MergeSummary {
            edited_paths: vec!["a.js".to_string()],
            focus: Some("a.js".to_string()),
        };
        let entry = assistant_entry(&resp, &summary, "llama").expect("entry");

        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.content, "reasoning");
        let meta = entry.meta.expect("meta");
        assert_eq!(meta.read_files, vec!["src/App.js"]);
        assert_eq!(meta.edited_files, vec!["a.js"]);
        assert_eq!(meta.backend.as_deref(), Some("llama"));
    }

    #[test]
    fn empty_rationale_appends_nothing() {
        let mut resp = response(FinishReason::Continue, Vec::new());
        resp.thoughts = "  ".to_string();
        assert!(assistant_entry(&resp, &MergeSummary::default(), "llama").is_none());
    }
}
