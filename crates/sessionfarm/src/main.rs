//! sessionfarm - operator CLI for the clustered session store
//!
//! Talks to the configured backend directly: checks connectivity, runs an
//! expiry pass, and inspects or deletes individual sessions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, delete, inspect, sweep};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// sessionfarm - clustered session store operator tool
#[derive(Parser)]
#[command(name = "sessionfarm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ./sessionfarm.toml)
    #[arg(short, long, global = true, env = "SESSIONFARM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the configured backend and report its endpoints
    Check(check::CheckArgs),

    /// Run one expiry pass against the backend
    Sweep(sweep::SweepArgs),

    /// Show a stored session
    Inspect(inspect::InspectArgs),

    /// Delete a stored session
    Delete(delete::DeleteArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sessionfarm=debug,sessionfarm_backend=debug,sessionfarm_session=debug,sessionfarm_config=debug,info"
    } else {
        "sessionfarm=info,sessionfarm_backend=warn,sessionfarm_session=warn,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
                ),
        )
        .init();

    let ctx = commands::Context::load(cli.config.as_deref(), cli.json, cli.verbose)?;

    match cli.command {
        Commands::Check(args) => check::run(args, &ctx),
        Commands::Sweep(args) => sweep::run(args, &ctx),
        Commands::Inspect(args) => inspect::run(args, &ctx),
        Commands::Delete(args) => delete::run(args, &ctx),
    }
}
