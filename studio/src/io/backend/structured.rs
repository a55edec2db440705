//! Structured-output backend speaking the Gemini `generateContent` protocol.
//!
//! Each round carries the behaviour contract as `systemInstruction`, the round
//! prompt as a single user turn, and a `responseMimeType` hint asking for JSON.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{Backend, BackendRequest};
use crate::io::config::StructuredBackendConfig;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

pub struct StructuredBackend {
    client: Client,
    base_url: String,
    api_key_env: String,
    api_key: Option<String>,
    thinking_budget: u32,
}

impl StructuredBackend {
    /// The API key is read from `config.api_key_env` once, at construction.
    pub fn new(config: &StructuredBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build HTTP client")?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            api_key,
            thinking_budget: config.thinking_budget,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl Backend for StructuredBackend {
    #[instrument(skip_all, fields(model = %request.backend_id))]
    async fn complete(&self, request: &BackendRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("missing API key (set {})", self.api_key_env))?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.backend_id
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "thinkingConfig": { "thinkingBudget": self.thinking_budget },
            },
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("send request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!(
                "model '{}' returned status {}: {}",
                request.backend_id,
                status.as_u16(),
                detail.trim()
            );
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("decode generateContent response")?;
        let text = answer_text(parsed);
        debug!(bytes = text.len(), "decoded structured response");
        Ok(text)
    }
}

/// Concatenate the answer parts of the first candidate, skipping thought parts.
fn answer_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}
