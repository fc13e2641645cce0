//! # wstest
//!
//! Example client that bootstraps a message bus session.
//!
//! ## Usage
//!
//! ```bash
//! # Handshake, subscribe to /players, wait for Ctrl-C
//! wstest run
//!
//! # Run with custom config, replay some events, then exit
//! wstest --config wstest.toml run --publish-file demos/players.json --once
//!
//! # Override settings with environment variables
//! WSTEST_SESSION__CONTEXT_PATH=/bus wstest run
//!
//! # Validate a release build profile
//! wstest check-profile profiles/wstest.profile.toml
//! ```

mod app;
mod config;
mod metrics;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line interface.
#[derive(Parser, Debug)]
#[command(name = "wstest", version, about = "Bootstrap a message bus client session")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "WSTEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a session against the loopback transport (default)
    Run(app::RunArgs),
    /// Load and validate a release build profile
    CheckProfile {
        /// Profile file (.toml or .json)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| Command::Run(app::RunArgs::default()));
    match command {
        Command::Run(args) => {
            let config = config::Config::load(cli.config.as_deref())?;
            let level = args.log_level.unwrap_or(config.session.log_level);
            init_tracing(level.as_str());

            // Tracing is only installed once the config names a level
            match config::Config::file(cli.config.as_deref()) {
                Some(file) => tracing::debug!("Loaded config from {}", file.display()),
                None => tracing::debug!("No config file found, using defaults"),
            }
            tracing::info!(
                location = %config.session.location,
                channel = %config.session.channel,
                "Starting wstest"
            );
            app::run(config, args).await
        }
        Command::CheckProfile { path } => {
            init_tracing("info");
            app::check_profile(&path)
        }
    }
}

fn init_tracing(level: &str) {
    let fallback = format!(
        "wstest_demo={level},wstest_core={level},wstest_transport={level}"
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
