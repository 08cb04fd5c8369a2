//! Connection manager: live WebSocket connections, their outbound queues,
//! and heartbeat bookkeeping.
//!
//! Each connection owns a bounded outbound queue. A newer view payload for a
//! subscription replaces that subscription's pending payload in place, so a
//! stalled client only ever receives the newest payload per subscription and
//! never an older one after a newer one. Control frames (pings, acks,
//! errors) are never displaced by payload traffic.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use pulseboard_core::protocol::ServerMessage;

/// Identifies one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Transport accepted, handshake not finished.
    Connecting,
    /// Fully established; accepts subscribes and receives pushes.
    Open,
    /// Graceful shutdown: no new subscribes, queued sends still flush.
    Draining,
    /// Terminal.
    Closed,
}

/// Why a send was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// No such connection, or it is closed.
    ConnectionGone,
    /// Queue is full of other subscriptions' payloads; retry next refresh.
    QueueFull,
}

struct QueueItem {
    subscription: Option<String>,
    message: ServerMessage,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

/// Bounded per-connection outbound queue.
#[derive(Clone)]
pub struct OutboundQueue {
    inner: Arc<QueueInner>,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    closed: false,
                }),
                notify: Notify::new(),
                capacity,
            }),
        }
    }

    /// Enqueue a view update, coalescing with any pending payload for the
    /// same subscription.
    fn push_update(&self, subscription_id: &str, message: ServerMessage) -> Result<(), SendError> {
        let mut state = self.inner.state.lock().expect("outbound queue mutex poisoned");
        if state.closed {
            return Err(SendError::ConnectionGone);
        }
        if let Some(pending) = state
            .items
            .iter_mut()
            .find(|i| i.subscription.as_deref() == Some(subscription_id))
        {
            // Replacing in place keeps per-subscription order intact.
            pending.message = message;
            return Ok(());
        }
        if state.items.len() >= self.inner.capacity {
            return Err(SendError::QueueFull);
        }
        state.items.push_back(QueueItem {
            subscription: Some(subscription_id.to_string()),
            message,
        });
        drop(state);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Enqueue a control frame. Not subject to the payload capacity cap;
    /// control frames are rare and tiny.
    fn push_control(&self, message: ServerMessage) -> Result<(), SendError> {
        let mut state = self.inner.state.lock().expect("outbound queue mutex poisoned");
        if state.closed {
            return Err(SendError::ConnectionGone);
        }
        state.items.push_back(QueueItem {
            subscription: None,
            message,
        });
        drop(state);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Cancel everything still queued and wake the consumer.
    fn close(&self) {
        let mut state = self.inner.state.lock().expect("outbound queue mutex poisoned");
        state.closed = true;
        state.items.clear();
        drop(state);
        self.inner.notify.notify_waiters();
        self.inner.notify.notify_one();
    }

    fn pop_now(&self) -> Result<Option<ServerMessage>, ()> {
        let mut state = self.inner.state.lock().expect("outbound queue mutex poisoned");
        if let Some(item) = state.items.pop_front() {
            return Ok(Some(item.message));
        }
        if state.closed {
            return Err(());
        }
        Ok(None)
    }
}

/// Consuming side of a connection's outbound queue, held by the socket
/// send task.
pub struct OutboundReceiver {
    queue: OutboundQueue,
}

impl OutboundReceiver {
    /// Next message to write to the socket; `None` once the connection
    /// closed and the queue is drained-or-cancelled.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let notified = self.queue.inner.notify.notified();
            match self.queue.pop_now() {
                Ok(Some(msg)) => return Some(msg),
                Err(()) => return None,
                Ok(None) => notified.await,
            }
        }
    }
}

struct ConnectionHandle {
    state: ConnState,
    last_seen: Instant,
    queue: OutboundQueue,
}

/// Registry of live connections. All mutation goes through these methods;
/// the map itself never crosses a concurrency boundary.
pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
    queue_capacity: usize,
}

impl ConnectionManager {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            queue_capacity,
        }
    }

    /// Register a freshly accepted transport.
    pub fn accept(&self) -> (ConnectionId, OutboundReceiver) {
        let id = ConnectionId::new();
        let queue = OutboundQueue::new(self.queue_capacity);
        let receiver = OutboundReceiver {
            queue: queue.clone(),
        };
        self.lock().insert(
            id,
            ConnectionHandle {
                state: ConnState::Connecting,
                last_seen: Instant::now(),
                queue,
            },
        );
        debug!(connection = %id, "Connection accepted");
        (id, receiver)
    }

    /// Transport handshake finished.
    pub fn mark_open(&self, id: ConnectionId) {
        if let Some(handle) = self.lock().get_mut(&id) {
            if handle.state == ConnState::Connecting {
                handle.state = ConnState::Open;
                handle.last_seen = Instant::now();
            }
        }
    }

    /// Record inbound activity as liveness.
    pub fn touch(&self, id: ConnectionId) {
        if let Some(handle) = self.lock().get_mut(&id) {
            handle.last_seen = Instant::now();
        }
    }

    /// Current state, if the connection exists.
    pub fn state(&self, id: ConnectionId) -> Option<ConnState> {
        self.lock().get(&id).map(|h| h.state)
    }

    /// Enqueue a view update for delivery.
    pub fn send_update(
        &self,
        id: ConnectionId,
        subscription_id: &str,
        message: ServerMessage,
    ) -> Result<(), SendError> {
        let queue = {
            let connections = self.lock();
            let handle = connections.get(&id).ok_or(SendError::ConnectionGone)?;
            match handle.state {
                ConnState::Open | ConnState::Draining => handle.queue.clone(),
                _ => return Err(SendError::ConnectionGone),
            }
        };
        queue.push_update(subscription_id, message)
    }

    /// Enqueue a control frame (ping, ack, error).
    pub fn send_control(&self, id: ConnectionId, message: ServerMessage) -> Result<(), SendError> {
        let queue = {
            let connections = self.lock();
            let handle = connections.get(&id).ok_or(SendError::ConnectionGone)?;
            match handle.state {
                ConnState::Open | ConnState::Draining => handle.queue.clone(),
                _ => return Err(SendError::ConnectionGone),
            }
        };
        queue.push_control(message)
    }

    /// Close a connection: cancels queued sends and removes it. Idempotent.
    pub fn close(&self, id: ConnectionId) -> bool {
        match self.lock().remove(&id) {
            Some(handle) => {
                handle.queue.close();
                info!(connection = %id, "Connection closed");
                true
            }
            None => false,
        }
    }

    /// Server-initiated graceful shutdown: every open connection stops
    /// accepting subscribes but keeps flushing.
    pub fn begin_drain_all(&self) {
        for handle in self.lock().values_mut() {
            if handle.state == ConnState::Open {
                handle.state = ConnState::Draining;
            }
        }
    }

    /// Close every connection whose last activity is older than `timeout`.
    /// Returns the closed ids so the caller can cascade subscription
    /// removal.
    pub fn sweep_expired(&self, timeout: Duration) -> Vec<ConnectionId> {
        let expired: Vec<ConnectionId> = {
            let connections = self.lock();
            connections
                .iter()
                .filter(|(_, h)| {
                    matches!(h.state, ConnState::Open | ConnState::Draining)
                        && h.last_seen.elapsed() > timeout
                })
                .map(|(id, _)| *id)
                .collect()
        };
        for id in &expired {
            info!(connection = %id, "Heartbeat timeout");
            self.close(*id);
        }
        expired
    }

    /// Queue a heartbeat ping on every open connection.
    pub fn send_pings(&self) {
        let queues: Vec<(ConnectionId, OutboundQueue)> = self
            .lock()
            .iter()
            .filter(|(_, h)| h.state == ConnState::Open)
            .map(|(id, h)| (*id, h.queue.clone()))
            .collect();
        for (id, queue) in queues {
            if queue.push_control(ServerMessage::HeartbeatPing).is_err() {
                debug!(connection = %id, "Ping skipped, connection closing");
            }
        }
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections.lock().expect("connection map mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_core::views::{ViewKind, ViewPayload};

    fn update(sub: &str, marker: &str) -> ServerMessage {
        ServerMessage::ViewUpdate {
            subscription_id: sub.to_string(),
            payload: ViewPayload {
                view_kind: ViewKind::List,
                data: serde_json::json!({ "marker": marker }),
                digest: marker.to_string(),
            },
        }
    }

    fn digest_of(msg: &ServerMessage) -> String {
        match msg {
            ServerMessage::ViewUpdate { payload, .. } => payload.digest.clone(),
            other => panic!("expected view update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_newer_payload_replaces_pending_same_subscription() {
        let manager = ConnectionManager::new(4);
        let (id, mut rx) = manager.accept();
        manager.mark_open(id);

        manager.send_update(id, "sub-1", update("sub-1", "v1")).unwrap();
        manager.send_update(id, "sub-1", update("sub-1", "v2")).unwrap();
        manager.send_update(id, "sub-2", update("sub-2", "w1")).unwrap();

        assert_eq!(digest_of(&rx.recv().await.unwrap()), "v2");
        assert_eq!(digest_of(&rx.recv().await.unwrap()), "w1");
    }

    #[tokio::test]
    async fn test_queue_full_rejects_unrelated_payload() {
        let manager = ConnectionManager::new(1);
        let (id, _rx) = manager.accept();
        manager.mark_open(id);

        manager.send_update(id, "sub-1", update("sub-1", "v1")).unwrap();
        // Same subscription still coalesces.
        manager.send_update(id, "sub-1", update("sub-1", "v2")).unwrap();
        // A different subscription cannot displace it.
        let err = manager
            .send_update(id, "sub-2", update("sub-2", "w1"))
            .unwrap_err();
        assert_eq!(err, SendError::QueueFull);
    }

    #[tokio::test]
    async fn test_control_frames_bypass_payload_cap() {
        let manager = ConnectionManager::new(1);
        let (id, mut rx) = manager.accept();
        manager.mark_open(id);

        manager.send_update(id, "sub-1", update("sub-1", "v1")).unwrap();
        manager.send_control(id, ServerMessage::HeartbeatPing).unwrap();

        assert_eq!(digest_of(&rx.recv().await.unwrap()), "v1");
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::HeartbeatPing
        ));
    }

    #[tokio::test]
    async fn test_close_cancels_queued_sends() {
        let manager = ConnectionManager::new(4);
        let (id, mut rx) = manager.accept();
        manager.mark_open(id);

        manager.send_update(id, "sub-1", update("sub-1", "v1")).unwrap();
        manager.close(id);

        assert!(rx.recv().await.is_none());
        assert_eq!(
            manager.send_update(id, "sub-1", update("sub-1", "v2")),
            Err(SendError::ConnectionGone)
        );
        // Idempotent.
        assert!(!manager.close(id));
    }

    #[tokio::test]
    async fn test_sends_rejected_before_handshake_completes() {
        let manager = ConnectionManager::new(4);
        let (id, _rx) = manager.accept();
        assert_eq!(manager.state(id), Some(ConnState::Connecting));
        assert_eq!(
            manager.send_update(id, "sub-1", update("sub-1", "v1")),
            Err(SendError::ConnectionGone)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_closes_stale_connections() {
        let manager = ConnectionManager::new(4);
        let (stale, _stale_rx) = manager.accept();
        manager.mark_open(stale);
        let (fresh, _fresh_rx) = manager.accept();
        manager.mark_open(fresh);

        tokio::time::advance(Duration::from_secs(61)).await;
        manager.touch(fresh);

        let closed = manager.sweep_expired(Duration::from_secs(60));
        assert_eq!(closed, vec![stale]);
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.state(fresh), Some(ConnState::Open));
    }

    #[tokio::test]
    async fn test_draining_still_flushes_but_state_visible() {
        let manager = ConnectionManager::new(4);
        let (id, mut rx) = manager.accept();
        manager.mark_open(id);
        manager.begin_drain_all();

        assert_eq!(manager.state(id), Some(ConnState::Draining));
        manager.send_update(id, "sub-1", update("sub-1", "v1")).unwrap();
        assert_eq!(digest_of(&rx.recv().await.unwrap()), "v1");
    }
}
