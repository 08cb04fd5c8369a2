//! Change notification command, for writers the filesystem watcher cannot
//! see (network mounts, remote syncs, scripted imports).

use anyhow::Result;
use clap::Args;

use pulseboard_core::notifier::ServerNotifier;

#[derive(Args)]
pub struct NotifyArgs {
    /// Server URL (defaults to $PULSEBOARD_URL or http://127.0.0.1:4400)
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn execute(args: NotifyArgs) -> Result<()> {
    let notifier = match args.url {
        Some(url) => ServerNotifier::with_url(&url),
        None => ServerNotifier::new(),
    };
    notifier.notify_changed().await;
    Ok(())
}
