//! Shared application state for the studio server.
//!
//! The server is the orchestrating shell: it owns the project file set and
//! conversation log, runs at most one agent loop at a time, and keeps the
//! preview engine fed with the latest file-set revision.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use studio::core::merge::MergeSummary;
use studio::core::types::{AgentResponse, ConversationEntry, HistoryLine, ProjectFileSet};
use studio::io::backend::BackendAdapter;
use studio::io::config::StudioConfig;
use studio::looping::{LoopConfig, LoopEvent, LoopHost, LoopOutcome, LoopRequest, run_loop};
use studio::preview::PreviewEngine;
use studio::session::Studio;

/// Events broadcast to SSE clients when studio state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    FilesChanged { revision: u64 },
    MessagesChanged,
    StatusChanged,
    PreviewChanged,
    Loop { event: LoopEvent },
}

impl ChangeEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::FilesChanged { .. } => "files",
            ChangeEvent::MessagesChanged => "messages",
            ChangeEvent::StatusChanged => "status",
            ChangeEvent::PreviewChanged => "preview",
            ChangeEvent::Loop { .. } => "loop",
        }
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Directory the project was loaded from.
    pub project_dir: PathBuf,
    pub config: Arc<StudioConfig>,
    pub adapter: Arc<BackendAdapter>,
    /// Broadcast sender for change events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    /// Origin serving preview resources, separate from the API's.
    pub preview_origin: Option<String>,
    studio: Arc<Mutex<Studio>>,
    preview: Arc<Mutex<PreviewEngine>>,
    revision_tx: Arc<watch::Sender<u64>>,
    active_loop: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(
        project_dir: PathBuf,
        config: StudioConfig,
        adapter: BackendAdapter,
        studio: Studio,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (revision_tx, _) = watch::channel(studio.revision());
        let preview = PreviewEngine::new(config.preview.clone());
        Self {
            project_dir,
            config: Arc::new(config),
            adapter: Arc::new(adapter),
            event_tx: Arc::new(event_tx),
            preview_origin: None,
            studio: Arc::new(Mutex::new(studio)),
            preview: Arc::new(Mutex::new(preview)),
            revision_tx: Arc::new(revision_tx),
            active_loop: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_preview_origin(mut self, origin: String) -> Self {
        self.preview_origin = Some(origin);
        self
    }

    pub fn studio(&self) -> MutexGuard<'_, Studio> {
        lock(&self.studio)
    }

    pub fn preview(&self) -> MutexGuard<'_, PreviewEngine> {
        lock(&self.preview)
    }

    /// Receiver for the file-set revision counter.
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Snapshot of the current file set.
    pub fn files(&self) -> ProjectFileSet {
        self.studio().files().clone()
    }

    /// Direct full-content edit from the user. Returns whether anything changed.
    pub fn edit_file(&self, path: &str, content: &str) -> Result<bool> {
        let (changed, revision) = {
            let mut studio = self.studio();
            let changed = studio.edit_file(path, content)?;
            (changed, studio.revision())
        };
        if changed {
            self.files_changed(revision);
        }
        Ok(changed)
    }

    fn files_changed(&self, revision: u64) {
        self.revision_tx.send_replace(revision);
        self.emit(ChangeEvent::FilesChanged { revision });
    }

    /// Rebuild the preview from the current files if they changed since the
    /// last build. Called by the debounce driver.
    pub fn rebuild_preview(&self) {
        let files = self.files();
        let report = self.preview().files_changed(&files);
        if let Some(report) = report {
            debug!(generation = report.generation, "preview rebuilt");
        }
        self.emit(ChangeEvent::PreviewChanged);
    }

    pub fn loop_running(&self) -> bool {
        lock(&self.active_loop).is_some()
    }

    /// Record the user prompt and start an agent loop in the background.
    pub fn start_loop(&self, prompt: &str, backend: &str) -> Result<JoinHandle<LoopOutcome>> {
        if self.adapter.registry().get(backend).is_none() {
            bail!("unknown backend '{backend}'");
        }

        let token = {
            let mut slot = lock(&self.active_loop);
            if slot.is_some() {
                bail!("a loop is already running");
            }
            self.studio().submit_user_message(prompt)?;
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        self.emit(ChangeEvent::MessagesChanged);
        info!(backend, "starting agent loop");

        let state = self.clone();
        let adapter = Arc::clone(&self.adapter);
        let request = LoopRequest {
            prompt: prompt.to_string(),
            backend: backend.to_string(),
        };
        let config = LoopConfig::from(&self.config.agent_loop);
        Ok(tokio::spawn(async move {
            let mut host = SharedHost {
                state: state.clone(),
            };
            let events = state.clone();
            let outcome = run_loop(&adapter, &mut host, &request, &config, &token, |event| {
                events.emit(ChangeEvent::Loop {
                    event: event.clone(),
                });
            })
            .await;
            lock(&state.active_loop).take();
            state.emit(ChangeEvent::StatusChanged);
            outcome
        }))
    }

    /// Request cancellation of the running loop. Returns false if none runs.
    pub fn stop_loop(&self) -> bool {
        match lock(&self.active_loop).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loop host over the shared studio. Each call takes the lock briefly, so
/// handlers stay responsive while a round is in flight.
struct SharedHost {
    state: AppState,
}

impl LoopHost for SharedHost {
    fn files(&self) -> ProjectFileSet {
        self.state.files()
    }

    fn history(&self, n: usize) -> Vec<HistoryLine> {
        self.state.studio().conversation().recent(n)
    }

    fn apply_round(&mut self, response: &AgentResponse, backend: &str) -> MergeSummary {
        let (summary, revision, changed) = {
            let mut studio = self.state.studio();
            let before = studio.revision();
            let summary = studio.apply_round(response, backend);
            (summary, studio.revision(), studio.revision() != before)
        };
        if changed {
            self.state.files_changed(revision);
        }
        self.state.emit(ChangeEvent::MessagesChanged);
        summary
    }

    fn set_phase(&mut self, phase: Option<String>) {
        self.state.studio().set_phase(phase);
        self.state.emit(ChangeEvent::StatusChanged);
    }

    fn set_autonomous(&mut self, autonomous: bool) {
        self.state.studio().set_autonomous(autonomous);
        self.state.emit(ChangeEvent::StatusChanged);
    }

    fn push_entry(&mut self, entry: ConversationEntry) {
        self.state.studio().push_entry(entry);
        self.state.emit(ChangeEvent::MessagesChanged);
    }
}
