//! HTTP route handlers for the studio API and preview resources.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};

use studio::core::export::{ExportArtifact, ExportManifest, export_artifacts, manifest_for};
use studio::core::types::{ConversationEntry, VirtualFile};
use studio::io::backend::BackendInfo;
use studio::preview::resources::{PREVIEW_PREFIX, ResourceKind};
use studio::preview::{ConsoleEntry, Overlay, PreviewMessage, PreviewState, SANDBOX_POLICY};
use studio::session::StudioStatus;

use crate::state::{AppState, ChangeEvent};

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn bad_request(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("{err:#}"))
}

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/files", get(list_files))
        .route("/files/{*path}", put(put_file))
        .route("/select", post(post_select))
        .route("/messages", get(list_messages))
        .route("/status", get(get_status))
        .route("/chat", post(post_chat))
        .route("/stop", post(post_stop))
        .route("/backends", get(list_backends))
        .route("/preview", get(get_preview))
        .route("/preview/start", post(preview_start))
        .route("/preview/stop", post(preview_stop))
        .route("/preview/refresh", post(preview_refresh))
        .route("/preview/dismiss", post(preview_dismiss))
        .route("/preview/console", post(preview_console))
        .route("/export", get(get_export))
}

/// Router serving built preview resources under `/preview/...`. Mounted on
/// its own listener so generated code never shares the API's origin.
pub fn preview_router() -> Router<AppState> {
    Router::new().route("/preview/{*resource}", get(get_resource))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FilesResponse {
    files: Vec<VirtualFile>,
    selected_path: Option<String>,
    revision: u64,
}

/// GET /api/files - full file set with the focused path.
async fn list_files(State(state): State<AppState>) -> Json<FilesResponse> {
    let studio = state.studio();
    Json(FilesResponse {
        files: studio.files().iter().cloned().collect(),
        selected_path: studio.selected_path().map(str::to_string),
        revision: studio.revision(),
    })
}

#[derive(Deserialize)]
struct EditBody {
    content: String,
}

#[derive(Serialize)]
struct EditResponse {
    changed: bool,
    revision: u64,
}

/// PUT /api/files/{*path} - direct full-content edit.
async fn put_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<EditBody>,
) -> ApiResult<Json<EditResponse>> {
    let changed = state
        .edit_file(&path, &body.content)
        .map_err(bad_request)?;
    let revision = state.studio().revision();
    Ok(Json(EditResponse { changed, revision }))
}

#[derive(Deserialize)]
struct SelectBody {
    path: String,
}

/// POST /api/select - move editor focus to an existing file.
async fn post_select(
    State(state): State<AppState>,
    Json(body): Json<SelectBody>,
) -> ApiResult<Json<StudioStatus>> {
    let status = {
        let mut studio = state.studio();
        studio.select(&body.path).map_err(bad_request)?;
        studio.status()
    };
    state.emit(ChangeEvent::StatusChanged);
    Ok(Json(status))
}

/// GET /api/messages - the conversation log.
async fn list_messages(State(state): State<AppState>) -> Json<Vec<ConversationEntry>> {
    Json(state.studio().conversation().entries().to_vec())
}

/// GET /api/status - phase label, autonomy flag, focus, counters.
async fn get_status(State(state): State<AppState>) -> Json<StudioStatus> {
    Json(state.studio().status())
}

#[derive(Deserialize)]
struct ChatBody {
    prompt: String,
    #[serde(default)]
    backend: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    backend: String,
}

/// POST /api/chat - record the prompt and start an autonomous loop.
async fn post_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> ApiResult<(StatusCode, Json<ChatResponse>)> {
    if state.loop_running() {
        return Err((StatusCode::CONFLICT, "a loop is already running".to_string()));
    }
    let backend = body
        .backend
        .unwrap_or_else(|| state.config.backends.default.clone());
    state
        .start_loop(&body.prompt, &backend)
        .map_err(bad_request)?;
    Ok((StatusCode::ACCEPTED, Json(ChatResponse { backend })))
}

#[derive(Serialize)]
struct StopResponse {
    stopping: bool,
}

/// POST /api/stop - cancel the running loop at its next checkpoint.
async fn post_stop(State(state): State<AppState>) -> Json<StopResponse> {
    Json(StopResponse {
        stopping: state.stop_loop(),
    })
}

#[derive(Serialize)]
struct BackendsResponse {
    default: String,
    backends: Vec<BackendInfo>,
}

/// GET /api/backends - selectable backends.
async fn list_backends(State(state): State<AppState>) -> Json<BackendsResponse> {
    Json(BackendsResponse {
        default: state.config.backends.default.clone(),
        backends: state.adapter.registry().list(),
    })
}

#[derive(Serialize)]
struct PreviewView {
    #[serde(flatten)]
    state: PreviewState,
    overlay: Option<Overlay>,
    console: Vec<ConsoleEntry>,
    resources: usize,
    sandbox: &'static str,
    /// Origin the document address is served from.
    origin: Option<String>,
}

fn preview_view(state: &AppState) -> PreviewView {
    let preview = state.preview();
    PreviewView {
        state: preview.state().clone(),
        overlay: preview.overlay().cloned(),
        console: preview.console().cloned().collect(),
        resources: preview.live_resources(),
        sandbox: SANDBOX_POLICY,
        origin: state.preview_origin.clone(),
    }
}

/// GET /api/preview - engine state, overlay, and console.
async fn get_preview(State(state): State<AppState>) -> Json<PreviewView> {
    Json(preview_view(&state))
}

/// POST /api/preview/start
async fn preview_start(State(state): State<AppState>) -> Json<PreviewView> {
    let files = state.files();
    state.preview().start(&files);
    state.emit(ChangeEvent::PreviewChanged);
    Json(preview_view(&state))
}

/// POST /api/preview/stop
async fn preview_stop(State(state): State<AppState>) -> Json<PreviewView> {
    state.preview().stop();
    state.emit(ChangeEvent::PreviewChanged);
    Json(preview_view(&state))
}

/// POST /api/preview/refresh - "retry build".
async fn preview_refresh(State(state): State<AppState>) -> Json<PreviewView> {
    let files = state.files();
    state.preview().refresh(&files);
    state.emit(ChangeEvent::PreviewChanged);
    Json(preview_view(&state))
}

/// POST /api/preview/dismiss - "stop/reset" from the overlay.
async fn preview_dismiss(State(state): State<AppState>) -> Json<PreviewView> {
    state.preview().dismiss_overlay();
    state.emit(ChangeEvent::PreviewChanged);
    Json(preview_view(&state))
}

/// POST /api/preview/console - message posted by the rendering surface.
async fn preview_console(
    State(state): State<AppState>,
    Json(message): Json<PreviewMessage>,
) -> StatusCode {
    state.preview().receive(message);
    state.emit(ChangeEvent::PreviewChanged);
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct ExportResponse {
    artifacts: Vec<ExportArtifact>,
    manifest: ExportManifest,
}

/// GET /api/export - flattened artifacts plus manifest.
async fn get_export(State(state): State<AppState>) -> Json<ExportResponse> {
    let artifacts = export_artifacts(&state.files());
    let manifest = manifest_for(&artifacts);
    Json(ExportResponse {
        artifacts,
        manifest,
    })
}

/// GET /preview/{*resource} - a resource of the live build generation.
async fn get_resource(State(state): State<AppState>, Path(resource): Path<String>) -> Response {
    let address = format!("{PREVIEW_PREFIX}/{resource}");
    let preview = state.preview();
    let Some(found) = preview.resource(&address) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let content_type = found.kind.content_type();
    let body = found.body.clone();
    if found.kind == ResourceKind::Document {
        (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
                (
                    header::CONTENT_SECURITY_POLICY,
                    format!("sandbox {SANDBOX_POLICY}"),
                ),
            ],
            body,
        )
            .into_response()
    } else {
        (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            body,
        )
            .into_response()
    }
}
