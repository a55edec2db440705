//! Studio configuration stored under `.studio/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the config file relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".studio/config.toml";

/// Studio configuration (TOML).
///
/// Missing fields default to the values the studio ships with, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StudioConfig {
    #[serde(rename = "loop")]
    pub agent_loop: LoopSettings,
    pub backends: BackendsConfig,
    pub preview: PreviewSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopSettings {
    /// Upper bound on backend rounds per loop session.
    pub max_iterations: u32,

    /// Pause between `continue` rounds, in milliseconds.
    pub backoff_ms: u64,

    /// Conversation entries handed to the adapter each round.
    pub history_window: usize,

    /// Conversation entries rendered into the prompt text.
    pub prompt_history: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            backoff_ms: 1500,
            history_window: 5,
            prompt_history: 3,
        }
    }
}

impl LoopSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendsConfig {
    /// Backend id used when a request does not name one.
    pub default: String,
    pub structured: StructuredBackendConfig,
    pub shared: SharedEndpointConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            default: "gemini-3-pro-preview".to_string(),
            structured: StructuredBackendConfig::default(),
            shared: SharedEndpointConfig::default(),
        }
    }
}

impl BackendsConfig {
    /// Whether `id` names a configured backend.
    pub fn is_known(&self, id: &str) -> bool {
        self.structured.id == id || self.shared.models.iter().any(|m| m.id == id)
    }
}

/// The structured-output backend (Gemini `generateContent`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StructuredBackendConfig {
    /// Backend id; also the model name sent upstream.
    pub id: String,
    pub name: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub thinking_budget: u32,
    pub timeout_secs: u64,
}

impl Default for StructuredBackendConfig {
    fn default() -> Self {
        Self {
            id: "gemini-3-pro-preview".to_string(),
            name: "Gemini 3 Pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "API_KEY".to_string(),
            thinking_budget: 4000,
            timeout_secs: 120,
        }
    }
}

/// The shared text-completion endpoint serving several community models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SharedEndpointConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub models: Vec<SharedModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedModel {
    pub id: String,
    pub name: String,
}

impl SharedModel {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

impl Default for SharedEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://text.pollinations.ai/".to_string(),
            timeout_secs: 120,
            models: vec![
                SharedModel::new("openai", "GPT-4o mini"),
                SharedModel::new("openai-large", "GPT-4o"),
                SharedModel::new("claude", "Claude 3.5"),
                SharedModel::new("deepseek", "DeepSeek R1"),
                SharedModel::new("mistral", "Mistral Large"),
                SharedModel::new("llama", "Llama 3.1"),
                SharedModel::new("gemini", "Gemini (shared endpoint)"),
                SharedModel::new("pixtral", "Pixtral"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreviewSettings {
    /// Quiet period before a file-set change triggers a rebuild, in milliseconds.
    pub debounce_ms: u64,

    /// File name suffix identifying the entry document.
    pub entry_file: String,

    /// Conventional source root; files under it get extra import-map keys.
    pub source_root: String,

    /// Console entries kept per build.
    pub console_limit: usize,

    /// External package name to CDN-hosted ESM URL.
    pub externals: BTreeMap<String, String>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        let externals = [
            ("react", "https://esm.sh/react@19.0.0"),
            ("react/jsx-runtime", "https://esm.sh/react@19.0.0/jsx-runtime"),
            ("react-dom", "https://esm.sh/react-dom@19.0.0"),
            ("react-dom/client", "https://esm.sh/react-dom@19.0.0/client"),
            ("lucide-react", "https://esm.sh/lucide-react@0.469.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            debounce_ms: 600,
            entry_file: "index.html".to_string(),
            source_root: "src/".to_string(),
            console_limit: 100,
            externals,
        }
    }
}

impl PreviewSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl StudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent_loop.max_iterations == 0 {
            return Err(anyhow!("loop.max_iterations must be > 0"));
        }
        if self.backends.structured.id.trim().is_empty() {
            return Err(anyhow!("backends.structured.id must be non-empty"));
        }
        if self.backends.shared.endpoint.trim().is_empty() {
            return Err(anyhow!("backends.shared.endpoint must be non-empty"));
        }
        if !self.backends.is_known(&self.backends.default) {
            return Err(anyhow!(
                "backends.default '{}' is not a configured backend",
                self.backends.default
            ));
        }
        if self.preview.entry_file.trim().is_empty() {
            return Err(anyhow!("preview.entry_file must be non-empty"));
        }
        if self.preview.console_limit == 0 {
            return Err(anyhow!("preview.console_limit must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StudioConfig::default()`.
pub fn load_config(path: &Path) -> Result<StudioConfig> {
    if !path.exists() {
        let cfg = StudioConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StudioConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StudioConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, StudioConfig::default());
        assert_eq!(cfg.agent_loop.max_iterations, 15);
        assert_eq!(cfg.preview.debounce(), Duration::from_millis(600));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".studio").join("config.toml");
        let cfg = StudioConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[loop]\nmax_iterations = 3\n\n[backends]\ndefault = \"llama\"\n")
            .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.agent_loop.max_iterations, 3);
        assert_eq!(cfg.agent_loop.backoff_ms, 1500);
        assert_eq!(cfg.backends.default, "llama");
        assert_eq!(cfg.preview.entry_file, "index.html");
    }

    #[test]
    fn unknown_default_backend_is_rejected() {
        let mut cfg = StudioConfig::default();
        cfg.backends.default = "nope".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("not a configured backend"));
    }
}
