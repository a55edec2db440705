//! Build & preview engine.
//!
//! `Stopped → Compiling → Running`, back to `Compiling` on every file-set
//! change or manual refresh, and to `Stopped` on stop. A failed build installs
//! an [`Overlay`] and leaves the engine running with no document, so nothing
//! half-built is ever served.

use std::collections::VecDeque;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::document::{head_injection, inject_head, rewrite_references};
use super::import_map::ImportMapBuilder;
use super::resources::{Resource, ResourceKind, ResourceStore};
use super::transpile::{EsmTranspiler, Transpiler};
use crate::core::language::{is_script, is_stylesheet};
use crate::core::types::ProjectFileSet;
use crate::io::config::PreviewSettings;

/// `sandbox` tokens for the rendering surface: scripts, same-origin module
/// loading, forms, popups and modals; no top navigation, no parent storage.
pub const SANDBOX_POLICY: &str = "allow-scripts allow-same-origin allow-forms allow-popups allow-modals";

pub const ESM_HINT: &str = "Modules must be ESM (import/export), not CommonJS (require).";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PreviewState {
    Stopped,
    Compiling,
    Running {
        /// Address of the built entry document; `None` after a failed build.
        document: Option<String>,
    },
}

impl PreviewState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, PreviewState::Stopped)
    }

    pub fn document(&self) -> Option<&str> {
        match self {
            PreviewState::Running { document } => document.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlaySource {
    Build,
    Runtime,
}

/// Blocking error view with retry/reset actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    pub source: OverlaySource,
    pub message: String,
    pub hint: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleEntry {
    pub id: u64,
    pub kind: ConsoleKind,
    pub message: String,
}

/// Structured message posted by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PreviewMessage {
    #[serde(rename = "PREVIEW_LOG")]
    Log(String),
    #[serde(rename = "PREVIEW_ERROR")]
    Error(String),
}

/// No file in the set ends with the configured entry file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEntryPointError {
    pub entry_file: String,
}

impl fmt::Display for MissingEntryPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing entry point: no file ends with '{}'. Ask the assistant to generate one.",
            self.entry_file
        )
    }
}

impl std::error::Error for MissingEntryPointError {}

/// What a successful build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub generation: u64,
    pub document: String,
    pub resources: usize,
    pub warnings: usize,
    pub released: usize,
}

#[derive(Debug, Default)]
struct ConsoleLog {
    entries: VecDeque<ConsoleEntry>,
    next_id: u64,
}

impl ConsoleLog {
    fn push(&mut self, kind: ConsoleKind, message: String, limit: usize) {
        self.next_id += 1;
        self.entries.push_back(ConsoleEntry {
            id: self.next_id,
            kind,
            message,
        });
        while self.entries.len() > limit {
            self.entries.pop_front();
        }
    }
}

pub struct PreviewEngine {
    settings: PreviewSettings,
    transpiler: Box<dyn Transpiler>,
    resources: ResourceStore,
    state: PreviewState,
    overlay: Option<Overlay>,
    console: ConsoleLog,
    built_fingerprint: Option<String>,
}

impl PreviewEngine {
    pub fn new(settings: PreviewSettings) -> Self {
        Self::with_transpiler(settings, Box::new(EsmTranspiler::new()))
    }

    pub fn with_transpiler(settings: PreviewSettings, transpiler: Box<dyn Transpiler>) -> Self {
        Self {
            settings,
            transpiler,
            resources: ResourceStore::new(),
            state: PreviewState::Stopped,
            overlay: None,
            console: ConsoleLog::default(),
            built_fingerprint: None,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn console(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.console.entries.iter()
    }

    pub fn resource(&self, address: &str) -> Option<&Resource> {
        self.resources.get(address)
    }

    pub fn live_resources(&self) -> usize {
        self.resources.live_count()
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter()
    }

    /// Start the engine and build. A no-op build-wise if already running.
    pub fn start(&mut self, files: &ProjectFileSet) -> Option<BuildReport> {
        if !self.state.is_stopped() {
            return None;
        }
        self.build(files)
    }

    /// Stop and release every resource.
    pub fn stop(&mut self) {
        let released = self.resources.release_all();
        self.state = PreviewState::Stopped;
        self.overlay = None;
        self.built_fingerprint = None;
        info!(released, "preview stopped");
    }

    /// Manual rebuild ("retry build"); ignored while stopped.
    pub fn refresh(&mut self, files: &ProjectFileSet) -> Option<BuildReport> {
        if self.state.is_stopped() {
            return None;
        }
        self.build(files)
    }

    /// Rebuild if running and the file set differs from the last build input.
    pub fn files_changed(&mut self, files: &ProjectFileSet) -> Option<BuildReport> {
        if self.state.is_stopped() {
            return None;
        }
        if self.built_fingerprint.as_deref() == Some(files.fingerprint().as_str()) {
            debug!("file set unchanged since last build");
            return None;
        }
        self.build(files)
    }

    /// "Stop/reset" from the overlay.
    pub fn dismiss_overlay(&mut self) {
        self.stop();
    }

    /// Record a message from the rendering surface. Errors also raise the overlay.
    pub fn receive(&mut self, message: PreviewMessage) {
        match message {
            PreviewMessage::Log(text) => self.log(ConsoleKind::Info, text),
            PreviewMessage::Error(text) => {
                self.log(ConsoleKind::Error, text.clone());
                if !self.state.is_stopped() {
                    self.overlay = Some(Overlay {
                        source: OverlaySource::Runtime,
                        message: text,
                        hint: ESM_HINT,
                    });
                }
            }
        }
    }

    /// Run the full pipeline. On failure the overlay carries the error and the
    /// previous generation is released.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn build(&mut self, files: &ProjectFileSet) -> Option<BuildReport> {
        self.state = PreviewState::Compiling;
        self.console.entries.clear();
        self.built_fingerprint = Some(files.fingerprint());

        match self.compile(files) {
            Ok(report) => {
                self.overlay = None;
                self.state = PreviewState::Running {
                    document: Some(report.document.clone()),
                };
                info!(
                    generation = report.generation,
                    resources = report.resources,
                    "preview built"
                );
                Some(report)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "preview build failed");
                self.resources.release_all();
                self.state = PreviewState::Running { document: None };
                self.overlay = Some(Overlay {
                    source: OverlaySource::Build,
                    message,
                    hint: ESM_HINT,
                });
                None
            }
        }
    }

    fn compile(&mut self, files: &ProjectFileSet) -> Result<BuildReport> {
        let entry = files
            .iter()
            .find(|file| file.path.ends_with(&self.settings.entry_file))
            .ok_or_else(|| MissingEntryPointError {
                entry_file: self.settings.entry_file.clone(),
            })?;

        let mut staged = self.resources.stage();
        let mut addressed = Vec::new();
        let mut warnings = 0;
        for file in files {
            if is_script(&file.path) {
                match self.transpiler.transpile(&file.path, &file.content) {
                    Ok(code) => {
                        let address = staged.add(&file.path, ResourceKind::Script, code);
                        addressed.push((file.path.clone(), address));
                    }
                    Err(err) => {
                        warnings += 1;
                        self.log(
                            ConsoleKind::Error,
                            format!("Transpile [{}]: {err:#}", file.path),
                        );
                    }
                }
            } else if is_stylesheet(&file.path) {
                let address = staged.add(&file.path, ResourceKind::Stylesheet, file.content.clone());
                addressed.push((file.path.clone(), address));
            }
        }

        let mut builder = ImportMapBuilder::new();
        for (name, url) in &self.settings.externals {
            builder.external(name, url);
        }
        for (path, address) in &addressed {
            builder.file(path, address, &self.settings.source_root);
        }
        let (import_map, collisions) = builder.finish();
        for collision in &collisions {
            warnings += 1;
            self.log(ConsoleKind::Info, collision.describe());
        }

        let injection = head_injection(&import_map)?;
        let html = inject_head(&entry.content, &injection);
        let html = rewrite_references(&html, &addressed)
            .with_context(|| format!("rewrite references in {}", entry.path))?;
        let document = staged.add(&entry.path, ResourceKind::Document, html);

        let generation = staged.generation();
        let resources = staged.len();
        let released = self.resources.install(staged);
        Ok(BuildReport {
            generation,
            document,
            resources,
            warnings,
            released,
        })
    }

    fn log(&mut self, kind: ConsoleKind, message: String) {
        self.console.push(kind, message, self.settings.console_limit);
    }
}
