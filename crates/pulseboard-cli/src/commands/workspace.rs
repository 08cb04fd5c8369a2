//! Workspace management commands.
//!
//! These write the shared registry file directly (so a later `serve` picks
//! the workspace up) and additionally poke any running server so it reacts
//! without a restart.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use pulseboard_core::notifier::ServerNotifier;
use pulseboard_web::workspaces::WorkspaceRegistry;

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Register a workspace (defaults to the current one)
    Register(RegisterArgs),

    /// List registered workspaces
    List,

    /// Switch the active workspace
    Use(UseArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Workspace root to register
    pub path: Option<PathBuf>,

    /// Issue database path (defaults to <path>/.issues/issues.db)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Args)]
pub struct UseArgs {
    /// Workspace root to activate
    pub path: PathBuf,
}

pub async fn execute(cmd: WorkspaceCommands, workspace: &Path) -> Result<()> {
    let registry = open_registry()?;

    match cmd {
        WorkspaceCommands::Register(args) => {
            let path = args.path.unwrap_or_else(|| workspace.to_path_buf());
            let path = path.canonicalize().unwrap_or(path);
            let db = args
                .db
                .unwrap_or_else(|| path.join(".issues/issues.db"));

            let path_str = path.display().to_string();
            let db_str = db.display().to_string();
            registry.register(&path_str, &db_str);
            ServerNotifier::new()
                .register_workspace(&path_str, &db_str)
                .await;

            println!("{} {}", "Registered".green().bold(), path_str);
            Ok(())
        }
        WorkspaceCommands::List => {
            let (entries, active) = registry.list();
            if entries.is_empty() {
                println!("{}", "No workspaces registered".dimmed());
                return Ok(());
            }
            for entry in entries {
                let marker = if active.as_deref() == Some(entry.path.as_str()) {
                    "*".cyan().bold().to_string()
                } else {
                    " ".to_string()
                };
                println!("{} {}  {}", marker, entry.path.bold(), entry.db_path.dimmed());
            }
            Ok(())
        }
        WorkspaceCommands::Use(args) => {
            let path = args.path.canonicalize().unwrap_or(args.path);
            let path_str = path.display().to_string();
            registry.set_active(&path_str)?;
            ServerNotifier::new().set_active_workspace(&path_str).await;

            println!("{} {}", "Active workspace".green().bold(), path_str);
            Ok(())
        }
    }
}

fn open_registry() -> Result<WorkspaceRegistry> {
    let storage = WorkspaceRegistry::default_storage_path()
        .ok_or_else(|| anyhow::anyhow!("cannot determine registry location: HOME is not set"))?;
    Ok(WorkspaceRegistry::with_storage(storage))
}
