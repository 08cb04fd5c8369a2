//! The push engine: owns the registries and runs refresh passes.
//!
//! A refresh pass reads one store snapshot, recomputes every active
//! subscription's view, and enqueues only the payloads whose digest moved.
//! Per-connection failures never block delivery to other connections.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use pulseboard_core::issue::{self, Snapshot};
use pulseboard_core::protocol::ServerMessage;
use pulseboard_core::views::{self, ViewKind, ViewParams};
use pulseboard_db::{ChangeOrigin, ChangeTx, DbPool, DbWatcher};

use crate::connections::{ConnState, ConnectionId, ConnectionManager, SendError};
use crate::scheduler::DEFAULT_DEBOUNCE_WINDOW;
use crate::subscriptions::{Subscription, SubscriptionRegistry};
use crate::workspaces::WorkspaceRegistry;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet window for coalescing change bursts.
    pub debounce_window: Duration,
    /// How often the server pings each connection.
    pub heartbeat_interval: Duration,
    /// Missed intervals before a connection counts as dead.
    pub heartbeat_timeout_multiple: u32,
    /// Pending view payloads per connection.
    pub queue_capacity: usize,
    /// Raw change events buffered ahead of the scheduler.
    pub change_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout_multiple: 2,
            queue_capacity: 32,
            change_buffer: 64,
        }
    }
}

/// Shared engine state. Constructed once at startup, handed around as Arc.
pub struct Engine {
    config: EngineConfig,
    pub connections: ConnectionManager,
    pub subscriptions: SubscriptionRegistry,
    pub workspaces: WorkspaceRegistry,
    store: RwLock<Arc<DbPool>>,
    change_tx: ChangeTx,
    watcher: Mutex<Option<DbWatcher>>,
}

impl Engine {
    pub fn new(
        pool: Arc<DbPool>,
        workspaces: WorkspaceRegistry,
        change_tx: ChangeTx,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            connections: ConnectionManager::new(config.queue_capacity),
            subscriptions: SubscriptionRegistry::new(),
            workspaces,
            store: RwLock::new(pool),
            change_tx,
            watcher: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hand the engine a filesystem watcher so workspace switches can
    /// rebind it.
    pub fn attach_watcher(&self, watcher: DbWatcher) {
        *self.watcher.lock().expect("watcher mutex poisoned") = Some(watcher);
    }

    /// The currently bound store.
    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.store.read().expect("store lock poisoned"))
    }

    /// Manual change poke, the non-filesystem leg of the change source.
    pub fn notify_changed(&self) {
        self.change_tx.notify(ChangeOrigin::Manual);
    }

    async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let pool = self.pool();
        let snapshot = tokio::task::spawn_blocking(move || issue::load_snapshot(&pool))
            .await
            .context("snapshot read task panicked")??;
        Ok(snapshot)
    }

    /// One full recomputation pass over every active subscription.
    pub async fn refresh_all(&self) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await?;
        let active = self.subscriptions.list_active();
        debug!(subscriptions = active.len(), issues = snapshot.issues.len(), "Refresh pass");

        for sub in active {
            let payload = match views::compute(sub.view_kind, &sub.params, &snapshot) {
                Ok(p) => p,
                Err(e) => {
                    warn!(subscription = %sub.id, error = %e, "View compute failed, skipping");
                    continue;
                }
            };
            if sub.last_digest.as_deref() == Some(payload.digest.as_str()) {
                continue;
            }
            let digest = payload.digest.clone();
            let message = ServerMessage::ViewUpdate {
                subscription_id: sub.id.clone(),
                payload,
            };
            match self.connections.send_update(sub.connection, &sub.id, message) {
                Ok(()) => self.subscriptions.record_sent(&sub.id, digest),
                Err(SendError::QueueFull) => {
                    // Not acknowledged; the digest stays put and the next
                    // refresh retries.
                    debug!(subscription = %sub.id, "Outbound queue full, payload deferred");
                }
                Err(SendError::ConnectionGone) => {
                    self.drop_connection(sub.connection);
                }
            }
        }
        Ok(())
    }

    /// Register interest and immediately push the first payload; new
    /// subscribers never wait for the next global refresh.
    pub async fn subscribe(
        &self,
        connection: ConnectionId,
        view_kind: ViewKind,
        params: ViewParams,
    ) -> anyhow::Result<Subscription> {
        match self.connections.state(connection) {
            Some(ConnState::Open) => {}
            Some(ConnState::Draining) => {
                anyhow::bail!("server is draining, new subscriptions are not accepted")
            }
            _ => anyhow::bail!("connection is not open"),
        }

        let sub = self
            .subscriptions
            .subscribe(connection, view_kind, params);
        // The heartbeat sweep may have closed the connection between the
        // state check and the insert; undo instead of leaving an orphan
        // around until the next refresh notices.
        if self.connections.state(connection).is_none() {
            self.subscriptions.unsubscribe(&sub.id);
            anyhow::bail!("connection closed during subscribe");
        }
        let _ = self.connections.send_control(
            connection,
            ServerMessage::Subscribed {
                subscription_id: sub.id.clone(),
                view_kind,
            },
        );

        let snapshot = self.snapshot().await?;
        let payload = views::compute(view_kind, &sub.params, &snapshot)?;
        let digest = payload.digest.clone();
        let message = ServerMessage::ViewUpdate {
            subscription_id: sub.id.clone(),
            payload,
        };
        if self
            .connections
            .send_update(connection, &sub.id, message)
            .is_ok()
        {
            self.subscriptions.record_sent(&sub.id, digest);
        }
        Ok(sub)
    }

    /// Withdraw one subscription. Idempotent.
    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.subscriptions.unsubscribe(subscription_id)
    }

    /// Tear down a connection and everything it owns. Idempotent.
    pub fn drop_connection(&self, connection: ConnectionId) {
        self.connections.close(connection);
        self.subscriptions.drop_connection(connection);
    }

    /// Upsert a workspace registration.
    pub fn register_workspace(&self, path: &str, db_path: &str) {
        self.workspaces.register(path, db_path);
    }

    /// Switch the active workspace: rebind the store and watcher, then
    /// force a full resend on the next refresh.
    pub fn set_active_workspace(&self, path: &str) -> anyhow::Result<()> {
        let entry = self
            .workspaces
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("workspace not registered: {}", path))?;
        let pool = Arc::new(DbPool::open(Path::new(&entry.db_path))?);

        self.workspaces.set_active(path)?;
        *self.store.write().expect("store lock poisoned") = pool;
        // The switch is committed; a watcher that cannot follow degrades to
        // manual notifications rather than unwinding half of it.
        if let Some(watcher) = self.watcher.lock().expect("watcher mutex poisoned").as_mut() {
            if let Err(e) = watcher.rebind(Path::new(&entry.db_path)) {
                warn!(error = %e, db = %entry.db_path, "Watcher rebind failed, relying on manual notifications");
            }
        }
        self.subscriptions.flush_digests();
        self.change_tx.notify(ChangeOrigin::Manual);
        info!(workspace = %path, db = %entry.db_path, "Active workspace switched");
        Ok(())
    }

    /// One heartbeat tick: reap dead connections, ping the rest.
    pub fn sweep_heartbeats(&self) {
        let timeout = self.config.heartbeat_interval * self.config.heartbeat_timeout_multiple;
        for id in self.connections.sweep_expired(timeout) {
            self.subscriptions.drop_connection(id);
        }
        self.connections.send_pings();
    }
}
