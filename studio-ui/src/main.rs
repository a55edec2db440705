//! Studio server - owns the project and conversation, runs agent loops, and
//! serves the live preview.

mod routes;
mod sse;
mod state;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use axum::Router;
use axum::routing::get;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use studio::io::backend::{BackendAdapter, BackendRegistry};
use studio::io::config::load_config;
use studio::io::init::StudioPaths;
use studio::io::project::load_project;
use studio::io::prompt::PromptBuilder;
use studio::preview::debounce::run_rebuild_driver;
use studio::session::Studio;

use crate::state::{AppState, ChangeEvent};

#[derive(Parser)]
#[command(name = "studio-ui")]
#[command(about = "Web server for the AI-assisted coding studio")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Port serving preview builds; kept apart from the API origin
    #[arg(long, default_value = "3002")]
    preview_port: u16,

    /// Project directory (contains .studio/)
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Config file (defaults to <project-dir>/.studio/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing UI static files (defaults to ./ui/dist in the project)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studio_ui=info".parse()?),
        )
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let paths = StudioPaths::new(&project_dir);
    let config_path = args.config.unwrap_or_else(|| paths.config_path.clone());
    let config = load_config(&config_path)?;
    info!(project_dir = %project_dir.display(), "starting studio-ui");

    let files = load_project(&project_dir)
        .with_context(|| format!("load project {}", project_dir.display()))?;
    let studio = if files.is_empty() {
        info!("project is empty, seeding starter files");
        Studio::starter()
    } else {
        Studio::new(files)
    };

    let registry = BackendRegistry::from_config(&config.backends)?;
    let adapter = BackendAdapter::new(registry, PromptBuilder::new(config.agent_loop.prompt_history));
    let debounce = config.preview.debounce();

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    let preview_addr: SocketAddr = format!("{}:{}", args.bind, args.preview_port).parse()?;
    if addr == preview_addr {
        bail!("--preview-port must differ from --port");
    }
    let state = AppState::new(project_dir.clone(), config, adapter, studio)
        .with_preview_origin(format!("http://{preview_addr}"));

    // Initial build, then debounced rebuilds on every revision.
    let files = state.files();
    state.preview().start(&files);

    let shutdown = CancellationToken::new();
    {
        let state = state.clone();
        tokio::spawn(run_rebuild_driver(
            state.subscribe_revisions(),
            debounce,
            shutdown.clone(),
            move |_revision| state.rebuild_preview(),
        ));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state.clone());

    let ui_dir = args
        .ui_dir
        .unwrap_or_else(|| project_dir.join("ui").join("dist"));

    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    // Generated code runs on its own origin, out of reach of the API.
    let preview_app = routes::preview_router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let preview_listener = tokio::net::TcpListener::bind(preview_addr).await?;
    info!(addr = %addr, preview = %preview_addr, "listening");

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            state.stop_loop();
            state.emit(ChangeEvent::StatusChanged);
            shutdown.cancel();
        });
    }

    let api = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let preview =
        axum::serve(preview_listener, preview_app).with_graceful_shutdown(shutdown.cancelled_owned());
    tokio::try_join!(api.into_future(), preview.into_future())?;

    Ok(())
}
