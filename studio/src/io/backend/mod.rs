//! Model backend adapter.
//!
//! The [`Backend`] trait is the strategy seam between the loop controller and
//! the generation services. One implementation exists per protocol family
//! ([`StructuredBackend`], [`SharedEndpointBackend`]); a [`BackendRegistry`]
//! selects one by runtime id. Tests register scripted backends that return
//! predetermined text without touching the network.
//!
//! [`BackendAdapter::generate`] never fails: transport errors, bad statuses,
//! and unparseable payloads all come back as an error-shaped [`AgentResponse`].

pub mod shared;
pub mod structured;

pub use shared::SharedEndpointBackend;
pub use structured::StructuredBackend;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::normalize::parse_agent_response;
use crate::core::types::{AgentResponse, HistoryLine, ProjectFileSet};
use crate::io::config::BackendsConfig;
use crate::io::prompt::{PromptBuilder, RoundInputs};

/// One request to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    /// Backend id the caller selected; doubles as the upstream model name.
    pub backend_id: String,
    /// Behaviour contract sent as the system instruction.
    pub system: String,
    /// Combined round prompt.
    pub prompt: String,
}

/// Abstraction over generation backends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send one round and return the backend's raw text.
    async fn complete(&self, request: &BackendRequest) -> Result<String>;
}

/// Catalogue entry for a selectable backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub id: String,
    pub name: String,
}

/// Backends keyed by id.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<String, (BackendInfo, Arc<dyn Backend>)>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the structured backend plus one shared-endpoint client serving
    /// every configured community model.
    pub fn from_config(config: &BackendsConfig) -> Result<Self> {
        let mut registry = Self::new();
        let structured = StructuredBackend::new(&config.structured)?;
        registry.register(
            &config.structured.id,
            &config.structured.name,
            Arc::new(structured),
        );

        let shared: Arc<dyn Backend> = Arc::new(SharedEndpointBackend::new(&config.shared)?);
        for model in &config.shared.models {
            registry.register(&model.id, &model.name, Arc::clone(&shared));
        }
        debug!(count = registry.backends.len(), "registered backends");
        Ok(registry)
    }

    pub fn register(&mut self, id: &str, name: &str, backend: Arc<dyn Backend>) {
        let info = BackendInfo {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.backends.insert(id.to_string(), (info, backend));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(id).map(|(_, backend)| Arc::clone(backend))
    }

    pub fn list(&self) -> Vec<BackendInfo> {
        self.backends.values().map(|(info, _)| info.clone()).collect()
    }
}

/// Inputs for one adapter call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub files: &'a ProjectFileSet,
    pub history: &'a [HistoryLine],
    pub review_phase: bool,
    pub backend: &'a str,
}

/// Uniform request/response contract over every registered backend.
pub struct BackendAdapter {
    registry: BackendRegistry,
    prompts: PromptBuilder,
}

impl BackendAdapter {
    pub fn new(registry: BackendRegistry, prompts: PromptBuilder) -> Self {
        Self { registry, prompts }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Run one round. Failures are folded into an error-shaped response that
    /// names the backend, so callers never see an `Err`.
    #[instrument(skip_all, fields(backend = request.backend, review = request.review_phase))]
    pub async fn generate(&self, request: &GenerateRequest<'_>) -> AgentResponse {
        match self.try_generate(request).await {
            Ok(response) => {
                info!(
                    finish = ?response.finish_reason,
                    changes = response.changes.len(),
                    "backend round complete"
                );
                response
            }
            Err(err) => {
                let cause = format!("{err:#}");
                warn!(error = %cause, "backend round failed");
                AgentResponse::backend_error(request.backend, &err)
            }
        }
    }

    async fn try_generate(&self, request: &GenerateRequest<'_>) -> Result<AgentResponse> {
        let backend = self
            .registry
            .get(request.backend)
            .ok_or_else(|| anyhow!("unknown backend '{}'", request.backend))?;
        let rendered = self.prompts.render(&RoundInputs {
            task: request.prompt,
            files: request.files,
            history: request.history,
            review_phase: request.review_phase,
        })?;
        let raw = backend
            .complete(&BackendRequest {
                backend_id: request.backend.to_string(),
                system: rendered.system,
                prompt: rendered.prompt,
            })
            .await?;
        debug!(bytes = raw.len(), "received backend text");
        parse_agent_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FinishReason;
    use crate::test_support::{ScriptedBackend, ScriptedReply, adapter_with, reply};

    fn request<'a>(files: &'a ProjectFileSet, backend: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            prompt: "do it",
            files,
            history: &[],
            review_phase: false,
            backend,
        }
    }

    #[tokio::test]
    async fn unknown_backend_becomes_error_response() {
        let (adapter, _) = adapter_with(ScriptedBackend::new(Vec::new()));
        let files = ProjectFileSet::new();
        let response = adapter.generate(&request(&files, "no-such-model")).await;

        assert_eq!(response.finish_reason, FinishReason::Error);
        assert!(response.thoughts.contains("unknown backend 'no-such-model'"));
    }

    #[tokio::test]
    async fn transport_failure_names_the_backend() {
        let (adapter, backend) =
            adapter_with(ScriptedBackend::new(vec![ScriptedReply::Fail("connection reset".into())]));
        let files = ProjectFileSet::new();
        let response = adapter.generate(&request(&files, "scripted")).await;

        assert_eq!(response.finish_reason, FinishReason::Error);
        assert!(response.thoughts.starts_with("Error with scripted: connection reset"));
        assert!(response.changes.is_empty());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_text_becomes_error_response() {
        let (adapter, _) =
            adapter_with(ScriptedBackend::new(vec![ScriptedReply::Raw("I cannot help".into())]));
        let files = ProjectFileSet::new();
        let response = adapter.generate(&request(&files, "scripted")).await;
        assert_eq!(response.finish_reason, FinishReason::Error);
        assert!(response.thoughts.contains("parse backend JSON"));
    }

    #[tokio::test]
    async fn sends_rendered_prompt_to_selected_backend() {
        let (adapter, backend) = adapter_with(ScriptedBackend::new(vec![reply(
            FinishReason::Done,
            Vec::new(),
        )]));
        let files: ProjectFileSet = [("src/App.js", "export default 1;")].into_iter().collect();
        let response = adapter.generate(&request(&files, "scripted")).await;

        assert_eq!(response.finish_reason, FinishReason::Done);
        let calls = backend.calls();
        assert_eq!(calls[0].backend_id, "scripted");
        assert!(calls[0].system.contains("JSON RESPONSE SCHEMA"));
        assert!(calls[0].prompt.contains("export default 1;"));
    }

    #[test]
    fn registry_from_default_config_lists_every_backend() {
        let registry = BackendRegistry::from_config(&BackendsConfig::default()).expect("registry");
        let ids: Vec<String> = registry.list().into_iter().map(|b| b.id).collect();
        assert!(ids.contains(&"gemini-3-pro-preview".to_string()));
        assert!(ids.contains(&"openai-large".to_string()));
        assert_eq!(ids.len(), 9);
        assert!(registry.get("deepseek").is_some());
        assert!(registry.get("nope").is_none());
    }
}
