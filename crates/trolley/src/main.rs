//! Trolley - expiring cart and session state
//!
//! Main entry point for the trolley CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{cart, session, watch};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Trolley - expiring cart and session state
#[derive(Parser)]
#[command(name = "trolley")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// State file holding the cart, its timestamp and the session token
    #[arg(long, global = true, env = "TROLLEY_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and edit the cart
    Cart(cart::CartArgs),

    /// Log in, log out and check the session
    Session(session::SessionArgs),

    /// Keep running so expirations and session polls fire live
    Watch(watch::WatchArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "trolley=debug,trolley_expiry=debug,trolley_config=debug,info"
    } else {
        "trolley=info,trolley_expiry=info,warn"
    };

    let log_dir = trolley_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "trolley.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "trolley=trace,trolley_expiry=trace,trolley_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context::load(cli.state, cli.json, cli.verbose)?;

    match cli.command {
        Commands::Cart(args) => cart::run(args, &ctx).await,
        Commands::Session(args) => session::run(args, &ctx).await,
        Commands::Watch(args) => watch::run(args, &ctx).await,
    }
}
