//! Push server command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use pulseboard_web::engine::EngineConfig;
use pulseboard_web::workspaces::WorkspaceRegistry;
use pulseboard_web::ServerOptions;

/// Where the tracker CLI keeps its database, relative to a workspace root.
const DEFAULT_DB_RELATIVE: &str = ".issues/issues.db";

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "4400", env = "PULSEBOARD_PORT")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Issue database path (defaults to the active workspace's database,
    /// then to <workspace>/.issues/issues.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Debounce window for change bursts, in milliseconds
    #[arg(long, default_value = "75")]
    pub debounce_ms: u64,

    /// Heartbeat ping interval, in seconds
    #[arg(long, default_value = "30")]
    pub heartbeat_secs: u64,

    /// Pending view payloads per connection
    #[arg(long, default_value = "32")]
    pub queue_capacity: usize,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (defaults to <workspace>/.pulseboard/serve.log)
    #[arg(long, requires = "log")]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, workspace: &Path) -> Result<()> {
    let registry_storage = WorkspaceRegistry::default_storage_path();
    let db_path = resolve_db_path(&args, workspace, registry_storage.as_deref());

    println!();
    println!("  {} {}", "Pulseboard".cyan().bold(), "Push Server".bold());
    println!();
    println!("  {}   {}", "Database".green(), db_path.display());
    println!("  {}        http://{}:{}/api", "API".green(), args.host, args.port);
    println!("  {}  ws://{}:{}/ws", "WebSocket".green(), args.host, args.port);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let options = ServerOptions {
        host: args.host,
        port: args.port,
        db_path,
        registry_storage,
        config: EngineConfig {
            debounce_window: Duration::from_millis(args.debounce_ms),
            heartbeat_interval: Duration::from_secs(args.heartbeat_secs),
            queue_capacity: args.queue_capacity,
            ..EngineConfig::default()
        },
    };

    pulseboard_web::run_server(options).await
}

fn resolve_db_path(args: &ServeArgs, workspace: &Path, registry: Option<&Path>) -> PathBuf {
    if let Some(db) = &args.db {
        return db.clone();
    }
    if let Some(storage) = registry {
        let registry = WorkspaceRegistry::with_storage(storage.to_path_buf());
        if let Some(active) = registry.active() {
            return PathBuf::from(active.db_path);
        }
    }
    workspace.join(DEFAULT_DB_RELATIVE)
}
