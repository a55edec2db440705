//! Agent loop controller.
//!
//! [`run_loop`] drives sequential backend rounds against a [`LoopHost`], which
//! owns the project state. The controller never mutates files itself: it hands
//! each response to [`LoopHost::apply_round`] and decides whether to continue,
//! enter the review phase, or stop.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::merge::MergeSummary;
use crate::core::types::{
    AgentResponse, ConversationEntry, FinishReason, HistoryLine, ProjectFileSet,
};
use crate::io::backend::{BackendAdapter, GenerateRequest};
use crate::io::config::LoopSettings;

/// State owner the loop reads snapshots from and merges rounds into.
pub trait LoopHost {
    /// Snapshot of the full current file set.
    fn files(&self) -> ProjectFileSet;

    /// The last `n` conversation entries, role and content only.
    fn history(&self, n: usize) -> Vec<HistoryLine>;

    /// Merge a round's edits and record its rationale.
    fn apply_round(&mut self, response: &AgentResponse, backend: &str) -> MergeSummary;

    fn set_phase(&mut self, phase: Option<String>);

    fn set_autonomous(&mut self, autonomous: bool);

    fn push_entry(&mut self, entry: ConversationEntry);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub backoff: Duration,
    pub history_window: usize,
}

impl From<&LoopSettings> for LoopConfig {
    fn from(settings: &LoopSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            backoff: settings.backoff(),
            history_window: settings.history_window,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&LoopSettings::default())
    }
}

/// What the user asked for and which backend should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRequest {
    pub prompt: String,
    pub backend: String,
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoopStop {
    /// The cancellation token fired.
    Cancelled,
    /// A round came back with `finishReason: error`.
    BackendError { message: String },
    /// `max_iterations` rounds were issued without converging.
    IterationLimit { max_iterations: u32 },
    /// The review round confirmed completion.
    Complete,
}

impl LoopStop {
    /// Text of the terminal conversation entry.
    pub fn terminal_message(&self) -> &'static str {
        match self {
            LoopStop::Cancelled => "Autonomous loop stopped by user.",
            LoopStop::BackendError { .. } => "Autonomous loop halted: backend error.",
            LoopStop::IterationLimit { .. } => "Iteration limit reached.",
            LoopStop::Complete => "Task complete. All systems stable.",
        }
    }
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    /// Backend rounds issued, including one discarded by cancellation.
    pub invocations: u32,
    pub stop: LoopStop,
}

/// Progress notifications for observers (CLI output, SSE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopEvent {
    Phase {
        iteration: u32,
        label: String,
    },
    Round {
        iteration: u32,
        finish_reason: FinishReason,
        edited: Vec<String>,
    },
    Finished(LoopOutcome),
}

/// Run backend rounds until completion, error, cancellation, or the iteration
/// limit, then append exactly one terminal system entry.
///
/// A `done` outside the review phase forces one more round as a stability
/// check. Cancellation is checked before each round and again once the
/// backend answers; a cancelled round's response is discarded unmerged.
#[instrument(skip_all, fields(backend = %request.backend))]
pub async fn run_loop<H: LoopHost, F: FnMut(&LoopEvent)>(
    adapter: &BackendAdapter,
    host: &mut H,
    request: &LoopRequest,
    config: &LoopConfig,
    cancel: &CancellationToken,
    mut on_event: F,
) -> LoopOutcome {
    host.set_autonomous(true);
    info!(max_iterations = config.max_iterations, "loop started");

    let mut iteration = 0u32;
    let mut invocations = 0u32;
    let mut review_phase = false;
    let mut failure: Option<String> = None;

    while !cancel.is_cancelled() && iteration < config.max_iterations {
        let prefix = if review_phase {
            "Stability check:".to_string()
        } else {
            format!("Cycle {}:", iteration + 1)
        };
        let label = format!("{prefix} Analyzing filesystem...");
        host.set_phase(Some(label.clone()));
        on_event(&LoopEvent::Phase { iteration, label });

        let files = host.files();
        let history = host.history(config.history_window);
        let response = adapter
            .generate(&GenerateRequest {
                prompt: &request.prompt,
                files: &files,
                history: &history,
                review_phase,
                backend: &request.backend,
            })
            .await;
        invocations += 1;

        if cancel.is_cancelled() {
            debug!(iteration, "discarding response after cancellation");
            break;
        }

        if let Some(action) = &response.current_action {
            let label = format!("{prefix} {action}");
            host.set_phase(Some(label.clone()));
            on_event(&LoopEvent::Phase { iteration, label });
        }

        let summary = host.apply_round(&response, &request.backend);
        info!(
            iteration,
            finish = ?response.finish_reason,
            edited = summary.edited_paths.len(),
            "round merged"
        );
        on_event(&LoopEvent::Round {
            iteration,
            finish_reason: response.finish_reason,
            edited: summary.edited_paths,
        });

        match response.finish_reason {
            FinishReason::Done if review_phase => break,
            FinishReason::Done => {
                review_phase = true;
                iteration += 1;
            }
            FinishReason::Error => {
                failure = Some(response.thoughts);
                break;
            }
            FinishReason::Continue => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(config.backoff) => {}
                }
                iteration += 1;
            }
        }
    }

    let stop = if cancel.is_cancelled() {
        LoopStop::Cancelled
    } else if let Some(message) = failure.clone() {
        LoopStop::BackendError { message }
    } else if invocations >= config.max_iterations {
        LoopStop::IterationLimit {
            max_iterations: config.max_iterations,
        }
    } else {
        LoopStop::Complete
    };

    host.set_autonomous(false);
    host.set_phase(failure);
    host.push_entry(ConversationEntry::system(stop.terminal_message()));
    info!(invocations, stop = ?stop, "loop finished");

    let outcome = LoopOutcome { invocations, stop };
    on_event(&LoopEvent::Finished(outcome.clone()));
    outcome
}
