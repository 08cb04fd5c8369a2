//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod notify;
pub mod serve;
pub mod workspace;

/// Pulseboard - live issue board push server
#[derive(Parser)]
#[command(name = "pulseboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace root (defaults to current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the push server
    Serve(serve::ServeArgs),

    /// Manage registered workspaces
    #[command(subcommand)]
    Workspace(workspace::WorkspaceCommands),

    /// Tell a running server that the issue database changed
    Notify(notify::NotifyArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let workspace = self
            .workspace
            .unwrap_or_else(|| std::env::current_dir().unwrap());

        match self.command {
            Commands::Serve(args) => serve::execute(args, &workspace).await,
            Commands::Workspace(cmd) => workspace::execute(cmd, &workspace).await,
            Commands::Notify(args) => notify::execute(args).await,
        }
    }
}
