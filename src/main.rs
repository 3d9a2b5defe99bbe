//! pjbuild - pjproject iOS cross-compiler
//!
//! Command-line entry point: parses arguments, initializes logging and
//! dispatches to the selected command.

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pjbuild::commands::{CommonOptions, MergeCommand, PlanCommand, RunCommand};
use pjbuild::core::{APP_NAME, VERSION};

/// Build pjproject for iOS as fat static libraries
#[derive(Parser)]
#[command(name = "pjbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the build staging area
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/pjbuild.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fail when a library is missing any built architecture
    #[arg(long, global = true)]
    strict: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, build and merge (default)
    Run,
    /// Merge already installed per-architecture libraries
    Merge,
    /// Show layout, commands and environment without building
    Plan {
        /// Print the resolved configuration as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("{} v{}", APP_NAME, VERSION);

    let options = CommonOptions {
        root: cli.root,
        config: cli.config,
        strict: cli.strict,
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => RunCommand { options }.execute().await,
        Commands::Merge => MergeCommand { options }.execute().await,
        Commands::Plan { json } => PlanCommand { options, json }.execute().await,
    }
}
