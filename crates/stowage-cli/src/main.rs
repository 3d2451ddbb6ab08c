//! stowage CLI - binary package deployment tool

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// stowage - deploy prebuilt packages into relocatable folders
#[derive(Debug, Parser)]
#[command(name = "stowage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Home folder holding global.toml and the package cache
    #[arg(long, global = true)]
    home: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve dependencies, run deployers and write generators
    Install(commands::install::InstallArgs),

    /// Package cache management
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommand,
    },

    /// Editable package management
    Editable {
        #[command(subcommand)]
        command: commands::editable::EditableCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Spans of running deployers are shown as progress lines
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .with(filter)
        .init();

    let home = stowage_core::config::resolve_home(cli.home.as_deref()).into_diagnostic()?;
    let current_dir = std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."));

    match cli.command {
        Commands::Install(args) => commands::install::run(&home, &current_dir, args),
        Commands::Cache { command } => commands::cache::run(&home, &current_dir, command),
        Commands::Editable { command } => commands::editable::run(&home, &current_dir, command),
    }
}
