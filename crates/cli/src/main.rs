//! Voxelwright CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write a default config file
//! - `simulate`: Run a scene file against an in-memory world
//! - `config`: Show, locate or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod scene;

#[derive(Parser)]
#[command(
    name = "voxelwright",
    about = "Voxelwright: schematic reconciliation and build planning",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config.toml
    Init,

    /// Simulate a build described by a scene file
    Simulate {
        /// Scene TOML file
        scene: PathBuf,

        /// Use this config file instead of ~/.voxelwright/config.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many ticks (overrides the scene)
        #[arg(long)]
        max_ticks: Option<u32>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Parse and sanity-check the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Simulate {
            scene,
            config,
            max_ticks,
            json,
        } => commands::simulate::run(&scene, config.as_deref(), max_ticks, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
