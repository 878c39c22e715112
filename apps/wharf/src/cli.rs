//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wharf - run CI/CD build definitions as Kubernetes pods
#[derive(Parser)]
#[command(name = "wharf")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run CI/CD build definitions as Kubernetes pods")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output events and the result as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging and phase output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a build definition
    Run {
        /// Resolved build definition (YAML)
        #[arg(short, long, default_value = "wharf-ci.yml", value_name = "FILE")]
        definition: PathBuf,

        /// Only run the stage with this name
        #[arg(short, long, value_name = "NAME")]
        stage: Option<String>,

        /// Directory transferred into every step
        #[arg(short, long, default_value = ".", value_name = "DIR")]
        workspace: PathBuf,

        /// Namespace to create step pods in
        #[arg(short, long, value_name = "NS")]
        namespace: Option<String>,
    },
}
