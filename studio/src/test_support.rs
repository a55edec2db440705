//! Test-only backends and fixtures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::types::{AgentResponse, FileChange, FinishReason};
use crate::io::backend::{Backend, BackendAdapter, BackendRegistry, BackendRequest};
use crate::io::prompt::PromptBuilder;

/// Backend id under which [`adapter_with`] registers the scripted backend.
pub const SCRIPTED_ID: &str = "scripted";

/// One canned answer from a [`ScriptedBackend`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Serialized to the wire JSON shape before being returned.
    Json(AgentResponse),
    /// Returned verbatim.
    Raw(String),
    /// Returned as a transport error with this message.
    Fail(String),
}

/// Backend that replays queued replies and records every request.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    calls: Mutex<Vec<BackendRequest>>,
    cancel_on_call: Option<CancellationToken>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    /// Answer every call with `reply`.
    pub fn always(reply: ScriptedReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    /// Cancel `token` while the call is in flight, before the reply is returned.
    pub fn cancel_on_call(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<BackendRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let mut queue = self.replies.lock().ok()?;
        queue.pop_front().or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        match self.next_reply() {
            Some(ScriptedReply::Json(response)) => Ok(serde_json::to_string(&response)?),
            Some(ScriptedReply::Raw(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => bail!("scripted backend has no replies left"),
        }
    }
}

/// Adapter whose only backend is `backend`, registered as [`SCRIPTED_ID`].
pub fn adapter_with(backend: ScriptedBackend) -> (BackendAdapter, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let mut registry = BackendRegistry::new();
    registry.register(SCRIPTED_ID, "Scripted", Arc::clone(&backend) as Arc<dyn Backend>);
    (BackendAdapter::new(registry, PromptBuilder::default()), backend)
}

/// A well-formed round with the given signal and edits.
pub fn reply(finish_reason: FinishReason, changes: Vec<FileChange>) -> ScriptedReply {
    ScriptedReply::Json(AgentResponse {
        thoughts: format!("scripted {finish_reason:?} round"),
        read_files: Vec::new(),
        changes,
        finish_reason,
        current_action: None,
    })
}

/// Like [`reply`] but with an explicit status string.
pub fn reply_with_action(
    finish_reason: FinishReason,
    changes: Vec<FileChange>,
    action: &str,
) -> ScriptedReply {
    match reply(finish_reason, changes) {
        ScriptedReply::Json(mut response) => {
            response.current_action = Some(action.to_string());
            ScriptedReply::Json(response)
        }
        other => other,
    }
}

pub fn change(path: &str, content: &str) -> FileChange {
    FileChange::new(path, content)
}
