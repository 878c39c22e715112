//! wharf - run CI/CD build definitions as Kubernetes pods
//!
//! Loads configuration and a resolved build definition, connects to the
//! cluster and runs the build while rendering its events.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wharf_builder::{BuildContext, Builder};
use wharf_cluster::KubeOrchestrator;
use wharf_config::Config;
use wharf_events::EventReceiver;
use wharf_types::{BuildOptions, BuildResult, Definition, Status};

/// Exit code used when the build was interrupted
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(status) => process::exit(exit_code(status)),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<Status, CliError> {
    info!("Starting wharf v{}", env!("CARGO_PKG_VERSION"));

    // Defaults < file < environment < CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;

    match cli.command {
        Commands::Run {
            definition,
            stage,
            workspace,
            namespace,
        } => {
            if let Some(namespace) = namespace {
                config.kubernetes.namespace = namespace;
            }
            let options = stage
                .map(BuildOptions::with_stage_filter)
                .unwrap_or_default();
            run_build(&config, &cli.global, definition, workspace, options).await
        }
    }
}

async fn run_build(
    config: &Config,
    global: &GlobalArgs,
    definition_path: PathBuf,
    workspace: PathBuf,
    options: BuildOptions,
) -> Result<Status, CliError> {
    if !workspace.is_dir() {
        return Err(CliError::InvalidArguments(format!(
            "workspace {} is not a directory",
            workspace.display()
        )));
    }
    let definition = Definition::load_from_file(&definition_path)?;

    let orchestrator = KubeOrchestrator::connect(&config.kubernetes).await?;
    info!(namespace = orchestrator.namespace(), "Using cluster namespace");

    let (event_sender, event_receiver) = wharf_events::channel();
    let context = BuildContext::new(Arc::new(orchestrator), config, workspace)
        .with_event_sender(event_sender);
    let builder = Builder::new(context, definition).with_options(options);

    let token = CancellationToken::new();
    spawn_interrupt_handler(token.clone());

    let mut event_handler = EventHandler::new(global.json, global.debug);
    let result = build_with_events(&builder, &token, event_receiver, &mut event_handler).await?;

    OutputRenderer::new(global.json).render_result(&result)?;
    Ok(result.status)
}

/// Run the build while rendering its events as they arrive
async fn build_with_events(
    builder: &Builder,
    token: &CancellationToken,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<BuildResult, CliError> {
    let mut build_future = Box::pin(builder.build(token));

    loop {
        select! {
            // Build completed
            result = &mut build_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return Ok(result?);
            }

            Some(event) = event_receiver.recv() => {
                event_handler.handle_event(event);
            }
        }
    }
}

/// Cancel the build on the first Ctrl-C
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling build");
            token.cancel();
        }
    });
}

fn exit_code(status: Status) -> i32 {
    match status {
        Status::Success | Status::None => 0,
        Status::Cancelled => EXIT_CANCELLED,
        _ => 1,
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let default_filter = if debug_enabled {
        "info,wharf=debug,wharf_builder=debug,wharf_cluster=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        // Events already go to stdout as JSON; keep logs off it
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
