//! Shared text-completion endpoint serving several community models.
//!
//! One POST per round with `{messages, model, jsonMode, seed}`. The endpoint
//! answers either with an OpenAI-style `choices[0].message.content` envelope
//! or with the target JSON object itself.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{Backend, BackendRequest};
use crate::io::config::SharedEndpointConfig;

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedRequest<'a> {
    messages: Vec<Message<'a>>,
    model: &'a str,
    json_mode: bool,
    seed: u32,
}

pub struct SharedEndpointBackend {
    client: Client,
    endpoint: String,
}

impl SharedEndpointBackend {
    pub fn new(config: &SharedEndpointConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Backend for SharedEndpointBackend {
    #[instrument(skip_all, fields(model = %request.backend_id))]
    async fn complete(&self, request: &BackendRequest) -> Result<String> {
        let body = SharedRequest {
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            model: &request.backend_id,
            json_mode: true,
            seed: rand::thread_rng().gen_range(0..1000),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("send request to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "model '{}' returned status {}",
                request.backend_id,
                status.as_u16()
            );
        }

        let payload: Value = response
            .json()
            .await
            .context("decode shared endpoint response")?;
        debug!("decoded shared endpoint payload");
        Ok(unwrap_envelope(payload))
    }
}

/// Reduce either response shape to the text the normalizer parses.
pub fn unwrap_envelope(payload: Value) -> String {
    if let Some(content) = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return content.to_string();
    }
    match payload {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
