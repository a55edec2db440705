//! The orchestrating shell's state.
//!
//! [`Studio`] is the single writer of the project: loop rounds and direct user
//! edits both land here. Every change to file contents bumps [`Studio::revision`],
//! which the preview side watches to decide when to rebuild.

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::debug;

use crate::core::conversation::Conversation;
use crate::core::merge::{MergeSummary, assistant_entry, merge_changes};
use crate::core::paths::safe_relative;
use crate::core::seed::{STARTER_FOCUS, starter_project};
use crate::core::types::{
    AgentResponse, ConversationEntry, HistoryLine, ProjectFileSet,
};
use crate::looping::LoopHost;

/// Point-in-time view of the shell's status fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioStatus {
    pub phase: Option<String>,
    pub is_autonomous: bool,
    pub selected_path: Option<String>,
    pub revision: u64,
    pub file_count: usize,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct Studio {
    files: ProjectFileSet,
    conversation: Conversation,
    selected_path: Option<String>,
    phase: Option<String>,
    autonomous: bool,
    revision: u64,
}

impl Studio {
    pub fn new(files: ProjectFileSet) -> Self {
        let selected_path = if files.contains(STARTER_FOCUS) {
            Some(STARTER_FOCUS.to_string())
        } else {
            files.paths().next().map(str::to_string)
        };
        Self {
            files,
            conversation: Conversation::new(),
            selected_path,
            phase: None,
            autonomous: false,
            revision: 0,
        }
    }

    /// A studio seeded with the starter project.
    pub fn starter() -> Self {
        Self::new(starter_project())
    }

    pub fn files(&self) -> &ProjectFileSet {
        &self.files
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected_path.as_deref()
    }

    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    pub fn is_autonomous(&self) -> bool {
        self.autonomous
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> StudioStatus {
        StudioStatus {
            phase: self.phase.clone(),
            is_autonomous: self.autonomous,
            selected_path: self.selected_path.clone(),
            revision: self.revision,
            file_count: self.files.len(),
            entry_count: self.conversation.len(),
        }
    }

    /// Record the user's instruction. Rejected while a loop is running.
    pub fn submit_user_message(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            bail!("message must be non-empty");
        }
        if self.autonomous {
            bail!("a loop is already running");
        }
        self.conversation.push(ConversationEntry::user(text));
        Ok(())
    }

    /// Replace (or create) one file with content typed by the user.
    /// Returns whether the contents changed.
    pub fn edit_file(&mut self, path: &str, content: &str) -> Result<bool> {
        safe_relative(path)?;
        let changed = self.files.upsert(path, content);
        if changed {
            self.revision += 1;
            debug!(path, revision = self.revision, "user edit applied");
        }
        Ok(changed)
    }

    pub fn select(&mut self, path: &str) -> Result<()> {
        if !self.files.contains(path) {
            bail!("no such file: {path}");
        }
        self.selected_path = Some(path.to_string());
        Ok(())
    }
}

impl Default for Studio {
    fn default() -> Self {
        Self::starter()
    }
}

impl LoopHost for Studio {
    fn files(&self) -> ProjectFileSet {
        self.files.clone()
    }

    fn history(&self, n: usize) -> Vec<HistoryLine> {
        self.conversation.recent(n)
    }

    fn apply_round(&mut self, response: &AgentResponse, backend: &str) -> MergeSummary {
        let before = self.files.fingerprint();
        let summary = merge_changes(&mut self.files, response);
        if self.files.fingerprint() != before {
            self.revision += 1;
        }
        if let Some(focus) = &summary.focus {
            self.selected_path = Some(focus.clone());
        }
        if let Some(entry) = assistant_entry(response, &summary, backend) {
            self.conversation.push(entry);
        }
        summary
    }

    fn set_phase(&mut self, phase: Option<String>) {
        self.phase = phase;
    }

    fn set_autonomous(&mut self, autonomous: bool) {
        self.autonomous = autonomous;
    }

    fn push_entry(&mut self, entry: ConversationEntry) {
        self.conversation.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FileChange, FinishReason, Role};

    fn round(finish_reason: FinishReason, changes: Vec<FileChange>, thoughts: &str) -> AgentResponse {
        AgentResponse {
            thoughts: thoughts.to_string(),
            read_files: vec!["src/App.js".to_string()],
            changes,
            finish_reason,
            current_action: None,
        }
    }

    #[test]
    fn starter_focuses_app() {
        let studio = Studio::starter();
        assert_eq!(studio.selected_path(), Some("src/App.js"));
        assert_eq!(studio.revision(), 0);
        assert!(!studio.is_autonomous());
    }

    #[test]
    fn user_edits_bump_revision_only_on_change() {
        let mut studio = Studio::starter();
        assert!(studio.edit_file("src/styles.css", "body {}").expect("edit"));
        assert!(!studio.edit_file("src/styles.css", "body {}").expect("edit"));
        assert_eq!(studio.revision(), 1);
        assert_eq!(
            studio.files().get("src/styles.css").map(|f| f.language.as_str()),
            Some("css")
        );
        assert!(studio.edit_file("../outside.js", "x").is_err());
    }

    #[test]
    fn applied_round_moves_focus_and_records_rationale() {
        let mut studio = Studio::starter();
        let summary = studio.apply_round(
            &round(
                FinishReason::Continue,
                vec![
                    FileChange::new("src/App.js", "a"),
                    FileChange::new("src/Reset.js", "b"),
                ],
                "split the component",
            ),
            "mistral",
        );

        assert_eq!(summary.edited_paths, vec!["src/App.js", "src/Reset.js"]);
        assert_eq!(studio.selected_path(), Some("src/Reset.js"));
        assert_eq!(studio.revision(), 1);
        let entry = studio.conversation().last().expect("assistant entry");
        assert_eq!(entry.role, Role::Assistant);
        let meta = entry.meta.as_ref().expect("meta");
        assert_eq!(meta.backend.as_deref(), Some("mistral"));
        assert_eq!(meta.edited_files.len(), 2);
    }

    #[test]
    fn silent_round_adds_no_entry() {
        let mut studio = Studio::starter();
        studio.apply_round(
            &round(FinishReason::Done, vec![FileChange::new("src/App.js", "z")], "  "),
            "llama",
        );
        assert!(studio.conversation().is_empty());
        assert_eq!(studio.files().get("src/App.js").map(|f| f.content.as_str()), Some("z"));
    }

    #[test]
    fn message_rejected_while_autonomous() {
        let mut studio = Studio::starter();
        studio.submit_user_message("build a todo list").expect("submit");
        studio.set_autonomous(true);
        let err = studio.submit_user_message("again").unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(studio.submit_user_message("   ").is_err());
        assert_eq!(studio.conversation().len(), 1);
    }

    #[test]
    fn select_requires_existing_file() {
        let mut studio = Studio::starter();
        studio.select("src/index.js").expect("select");
        assert_eq!(studio.selected_path(), Some("src/index.js"));
        assert!(studio.select("src/missing.js").is_err());
    }
}
