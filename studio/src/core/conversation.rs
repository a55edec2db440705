//! Append-only conversation log.

use serde::Serialize;

use crate::core::types::{ConversationEntry, HistoryLine};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    /// The last `n` entries, oldest first, reduced to role and content.
    pub fn recent(&self, n: usize) -> Vec<HistoryLine> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].iter().map(HistoryLine::from).collect()
    }
}
