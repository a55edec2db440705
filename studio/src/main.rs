//! AI-assisted coding studio CLI.
//!
//! Runs the autonomous edit loop against a project directory, builds the
//! preview bundle, and exports flattened artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use studio::core::types::ProjectFileSet;
use studio::exit_codes;
use studio::io::backend::{BackendAdapter, BackendRegistry};
use studio::io::config::{StudioConfig, load_config};
use studio::io::export::write_export;
use studio::io::init::{InitOptions, StudioPaths, init_studio};
use studio::io::project::{load_project, write_project};
use studio::io::prompt::PromptBuilder;
use studio::logging;
use studio::looping::{LoopConfig, LoopEvent, LoopRequest, LoopStop, run_loop};
use studio::preview::PreviewEngine;
use studio::preview::resources::PREVIEW_PREFIX;
use studio::session::Studio;

#[derive(Parser)]
#[command(name = "studio", version, about = "AI-assisted coding studio")]
struct Cli {
    /// Project directory.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Config file (defaults to `<project>/.studio/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.studio/` scaffolding and the starter project.
    Init {
        /// Overwrite existing studio files.
        #[arg(short, long)]
        force: bool,
        /// Skip writing the starter project.
        #[arg(long)]
        no_starter: bool,
    },
    /// Run the autonomous loop for one instruction and write edits back.
    Run {
        /// What to build or change.
        prompt: String,
        /// Backend id (see `studio backends`).
        #[arg(short, long)]
        backend: Option<String>,
        /// Override `loop.max_iterations`.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Do not write edited files back to the project directory.
        #[arg(long)]
        dry_run: bool,
    },
    /// Build the preview bundle once and report the result.
    Build {
        /// Write every built resource under this directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write one flattened artifact per file plus `manifest.json`.
    Export {
        /// Output directory (defaults to `.studio/export`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the selectable backends.
    Backends,
}

#[tokio::main]
async fn main() {
    logging::init("warn");
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = StudioPaths::new(&cli.project_dir);
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_path.clone());

    match cli.command {
        Command::Init { force, no_starter } => {
            let paths = init_studio(
                &cli.project_dir,
                &InitOptions {
                    force,
                    starter: !no_starter,
                },
            )?;
            println!("initialized {}", paths.studio_dir.display());
            Ok(exit_codes::OK)
        }
        Command::Run {
            prompt,
            backend,
            max_iterations,
            dry_run,
        } => {
            let config = load_config(&config_path)?;
            cmd_run(&paths, &config, &prompt, backend, max_iterations, dry_run).await
        }
        Command::Build { out } => {
            let config = load_config(&config_path)?;
            cmd_build(&paths, &config, out.as_deref())
        }
        Command::Export { out } => {
            let files = load_project(&paths.root)?;
            let dir = out.unwrap_or_else(|| paths.export_dir.clone());
            let artifacts = write_export(&dir, &files)?;
            println!("exported {} files to {}", artifacts.len(), dir.display());
            Ok(exit_codes::OK)
        }
        Command::Backends => {
            let config = load_config(&config_path)?;
            let registry = BackendRegistry::from_config(&config.backends)?;
            for info in registry.list() {
                let marker = if info.id == config.backends.default { "*" } else { " " };
                println!("{marker} {:<22} {}", info.id, info.name);
            }
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_run(
    paths: &StudioPaths,
    config: &StudioConfig,
    prompt: &str,
    backend: Option<String>,
    max_iterations: Option<u32>,
    dry_run: bool,
) -> Result<i32> {
    let backend = backend.unwrap_or_else(|| config.backends.default.clone());
    if !config.backends.is_known(&backend) {
        bail!("unknown backend '{backend}' (see `studio backends`)");
    }
    let files = load_project(&paths.root)?;
    let mut studio = if files.is_empty() {
        Studio::starter()
    } else {
        Studio::new(files)
    };
    studio.submit_user_message(prompt)?;

    let registry = BackendRegistry::from_config(&config.backends)?;
    let adapter = BackendAdapter::new(
        registry,
        PromptBuilder::new(config.agent_loop.prompt_history),
    );
    let mut loop_config = LoopConfig::from(&config.agent_loop);
    if let Some(max) = max_iterations {
        loop_config.max_iterations = max.max(1);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let request = LoopRequest {
        prompt: prompt.to_string(),
        backend,
    };
    let outcome = run_loop(&adapter, &mut studio, &request, &loop_config, &cancel, print_event).await;
    ctrl_c.abort();

    for entry in studio.conversation().entries().iter().skip(1) {
        println!("[{}] {}", entry.role.as_str(), entry.content);
    }

    if studio.revision() > 0 && !dry_run {
        let written = write_project(&paths.root, studio.files())?;
        println!("wrote {written} files to {}", paths.root.display());
    }

    Ok(match outcome.stop {
        LoopStop::Complete => exit_codes::OK,
        LoopStop::Cancelled => exit_codes::CANCELLED,
        LoopStop::IterationLimit { .. } => exit_codes::ITERATION_LIMIT,
        LoopStop::BackendError { .. } => exit_codes::BACKEND_ERROR,
    })
}

fn print_event(event: &LoopEvent) {
    match event {
        LoopEvent::Phase { label, .. } => eprintln!("{label}"),
        LoopEvent::Round { edited, .. } if !edited.is_empty() => {
            eprintln!("  edited: {}", edited.join(", "));
        }
        LoopEvent::Round { .. } | LoopEvent::Finished(_) => {}
    }
}

fn cmd_build(paths: &StudioPaths, config: &StudioConfig, out: Option<&Path>) -> Result<i32> {
    let files: ProjectFileSet = load_project(&paths.root)?;
    let mut engine = PreviewEngine::new(config.preview.clone());
    let report = engine.start(&files);

    for entry in engine.console() {
        eprintln!("[{:?}] {}", entry.kind, entry.message);
    }
    let Some(report) = report else {
        let message = engine
            .overlay()
            .map(|overlay| overlay.message.clone())
            .unwrap_or_else(|| "build failed".to_string());
        bail!("{message}");
    };

    if let Some(out) = out {
        for (address, resource) in engine.resources() {
            let rel = address
                .strip_prefix(PREVIEW_PREFIX)
                .unwrap_or(address)
                .trim_start_matches('/');
            let target = out.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            fs::write(&target, &resource.body)
                .with_context(|| format!("write {}", target.display()))?;
        }
    }
    if report.warnings > 0 {
        warn!(warnings = report.warnings, "build finished with warnings");
    }
    println!(
        "built generation {} ({} resources): {}",
        report.generation, report.resources, report.document
    );
    Ok(exit_codes::OK)
}
