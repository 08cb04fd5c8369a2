//! Pulseboard CLI
//!
//! Live issue-tracker push server and the tooling that talks to it.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

/// Initialize tracing with optional file logging.
fn init_tracing(log_file: Option<&std::path::Path>, verbose: bool) {
    let default_filter = if verbose {
        "pulseboard=debug,pulseboard_web=debug,pulseboard_db=debug"
    } else {
        "pulseboard=info,pulseboard_web=debug"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("Failed to open log file");

        // Log to both stdout and file when --log is used
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Serve(args) if args.log => {
            let workspace = cli
                .workspace
                .clone()
                .unwrap_or_else(|| std::env::current_dir().unwrap());
            Some(
                args.log_file
                    .clone()
                    .unwrap_or_else(|| workspace.join(".pulseboard/serve.log")),
            )
        }
        _ => None,
    };

    init_tracing(log_file.as_deref(), cli.verbose);

    cli.execute().await
}
