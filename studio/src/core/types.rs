//! Shared types for the studio core.
//!
//! These types define the contracts between the loop controller, the backend
//! adapter and the preview engine. They carry no I/O and serialize to the same
//! JSON shapes the browser front-end and the generation backends use.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::language::language_for_path;

/// One file of the virtual project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub path: String,
    pub content: String,
    /// Language tag derived from the path's extension (`"text"` if none).
    pub language: String,
}

impl VirtualFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: content.into(),
            language,
        }
    }
}

/// Path-keyed mapping of every file in the project.
///
/// Iteration order is lexicographic by path so prompts, import maps and
/// fingerprints are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectFileSet {
    files: BTreeMap<String, VirtualFile>,
}

impl ProjectFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Create or fully replace the file at `path`. Returns `true` when the
    /// stored content or language actually changed.
    pub fn upsert(&mut self, path: impl Into<String>, content: impl Into<String>) -> bool {
        let file = VirtualFile::new(path, content);
        match self.files.get(&file.path) {
            Some(existing) if existing == &file => false,
            _ => {
                self.files.insert(file.path.clone(), file);
                true
            }
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, VirtualFile> {
        self.files.values()
    }

    /// Content hash over every `(path, content)` pair.
    ///
    /// Two file sets with the same fingerprint are the same project; the preview
    /// engine uses this to skip rebuilds for no-op edits.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for file in self.files.values() {
            hasher.update((file.path.len() as u64).to_le_bytes());
            hasher.update(file.path.as_bytes());
            hasher.update((file.content.len() as u64).to_le_bytes());
            hasher.update(file.content.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a ProjectFileSet {
    type Item = &'a VirtualFile;
    type IntoIter = btree_map::Values<'a, String, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.values()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for ProjectFileSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut files = Self::new();
        for (path, content) in iter {
            files.upsert(path, content);
        }
        files
    }
}

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Optional metadata attached to assistant entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edited_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// One immutable entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntryMeta>,
}

impl ConversationEntry {
    fn now(role: Role, content: impl Into<String>, meta: Option<EntryMeta>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            meta,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::now(Role::User, content, None)
    }

    pub fn assistant(content: impl Into<String>, meta: EntryMeta) -> Self {
        Self::now(Role::Assistant, content, Some(meta))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::now(Role::System, content, None)
    }
}

/// Role and content only; what gets replayed to a backend as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryLine {
    pub role: Role,
    pub content: String,
}

impl From<&ConversationEntry> for HistoryLine {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.content.clone(),
        }
    }
}

/// Continuation signal returned by a backend round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Continue,
    Done,
    Error,
}

/// A proposed full-content replacement of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub reason: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            reason: String::new(),
        }
    }
}

/// Normalized result of one backend round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub thoughts: String,
    pub read_files: Vec<String>,
    pub changes: Vec<FileChange>,
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
}

pub const HALTED_ACTION: &str = "System Halted (Retry needed)";

impl AgentResponse {
    /// Uniform error-shaped response naming the backend that failed.
    pub fn backend_error(backend: &str, cause: &anyhow::Error) -> Self {
        Self {
            thoughts: format!(
                "Error with {backend}: {cause:#}. Please try a different backend \
                 (e.g. 'gemini' or 'openai-large') or re-submit."
            ),
            read_files: Vec::new(),
            changes: Vec::new(),
            finish_reason: FinishReason::Error,
            current_action: Some(HALTED_ACTION.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.finish_reason == FinishReason::Error
    }
}
