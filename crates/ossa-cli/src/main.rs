//! OSSA CLI - Conformance testing for agent manifests
//!
//! This CLI lets authors and CI pipelines:
//! - Test a manifest against a conformance profile
//! - Batch-test a set of manifests and summarize the results
//! - List the available profiles and inspect a resolved profile

use clap::{Parser, Subcommand};
use ossa_conformance::{ConformanceEngine, ManifestShapeValidator, ProfileStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod manifest;
mod output;

use commands::{conformance, Outcome};
use config::CliConfig;
use error::CliResult;

/// OSSA CLI application
#[derive(Parser)]
#[command(name = "ossa")]
#[command(about = "OSSA - Open Standard for Scalable Agents CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "OSSA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory of additional profile definitions
    #[arg(long, env = "OSSA_PROFILES_DIR", global = true)]
    profiles_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Conformance testing against profiles
    Conformance {
        #[command(subcommand)]
        command: conformance::ConformanceCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays parseable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::NonConformant) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> CliResult<Outcome> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let profiles_dir = cli.profiles_dir.or_else(|| config.profiles_dir.clone());

    let store = match &profiles_dir {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "layering profile directory over builtins");
            ProfileStore::with_directory(dir)?
        }
        None => ProfileStore::builtin()?,
    };
    let engine = ConformanceEngine::new(Arc::new(store), Arc::new(ManifestShapeValidator));

    let ctx = conformance::Context {
        engine,
        config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Conformance { command } => conformance::execute(command, &ctx).await,
    }
}
