//! Subscription registry.
//!
//! Tracks which connection wants which view, and the digest of the last
//! payload actually delivered to it. Subscriptions hold a plain connection
//! id, never an owning reference; the connection's lifecycle is
//! authoritative and teardown cascades here synchronously.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use pulseboard_core::views::{ViewKind, ViewParams};

use crate::connections::ConnectionId;

/// One client's standing request for a computed view.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: String,
    pub connection: ConnectionId,
    pub view_kind: ViewKind,
    pub params: ViewParams,
    /// Digest of the last acknowledged send; `None` until the first one.
    pub last_digest: Option<String>,
}

/// Registry of active subscriptions.
pub struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Upsert a subscription.
    ///
    /// At most one subscription per (connection, view kind): re-subscribing
    /// replaces the parameters (and issues a fresh id) instead of stacking.
    pub fn subscribe(
        &self,
        connection: ConnectionId,
        view_kind: ViewKind,
        params: ViewParams,
    ) -> Subscription {
        let mut subscriptions = self.lock();
        subscriptions.retain(|_, s| !(s.connection == connection && s.view_kind == view_kind));

        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            connection,
            view_kind,
            params,
            last_digest: None,
        };
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        debug!(
            subscription = %subscription.id,
            connection = %connection,
            view = view_kind.as_str(),
            "Subscribed"
        );
        subscription
    }

    /// Remove one subscription. No-op when already absent.
    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        let removed = self.lock().remove(subscription_id).is_some();
        if removed {
            debug!(subscription = %subscription_id, "Unsubscribed");
        }
        removed
    }

    /// Remove every subscription owned by a connection. Idempotent.
    pub fn drop_connection(&self, connection: ConnectionId) -> usize {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|_, s| s.connection != connection);
        let dropped = before - subscriptions.len();
        if dropped > 0 {
            debug!(connection = %connection, dropped, "Dropped connection subscriptions");
        }
        dropped
    }

    /// Consistent snapshot for a refresh pass.
    pub fn list_active(&self) -> Vec<Subscription> {
        self.lock().values().cloned().collect()
    }

    /// Look up one subscription.
    pub fn get(&self, subscription_id: &str) -> Option<Subscription> {
        self.lock().get(subscription_id).cloned()
    }

    /// Record an acknowledged send. Ignored if the subscription vanished in
    /// the meantime (closed connection); a dead entry must not be revived.
    pub fn record_sent(&self, subscription_id: &str, digest: String) {
        if let Some(s) = self.lock().get_mut(subscription_id) {
            s.last_digest = Some(digest);
        }
    }

    /// Forget every last-sent digest so the next refresh resends all views.
    /// Used when the active workspace switches.
    pub fn flush_digests(&self) {
        for s in self.lock().values_mut() {
            s.last_digest = None;
        }
    }

    /// Number of active subscriptions.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions
            .lock()
            .expect("subscription map mutex poisoned")
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionManager;

    fn connection() -> ConnectionId {
        ConnectionManager::new(4).accept().0
    }

    #[test]
    fn test_resubscribe_replaces_not_stacks() {
        let registry = SubscriptionRegistry::new();
        let conn = connection();

        let first = registry.subscribe(conn, ViewKind::List, ViewParams::default());
        let second = registry.subscribe(
            conn,
            ViewKind::List,
            ViewParams::default().set("status", "open"),
        );

        assert_ne!(first.id, second.id);
        assert_eq!(registry.count(), 1);
        assert!(registry.get(&first.id).is_none());
        assert_eq!(
            registry.get(&second.id).unwrap().params.get("status"),
            Some("open")
        );
    }

    #[test]
    fn test_different_view_kinds_coexist() {
        let registry = SubscriptionRegistry::new();
        let conn = connection();
        registry.subscribe(conn, ViewKind::List, ViewParams::default());
        registry.subscribe(conn, ViewKind::Board, ViewParams::default());
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_drop_connection_cascades_and_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let a = connection();
        let b = connection();
        registry.subscribe(a, ViewKind::List, ViewParams::default());
        registry.subscribe(a, ViewKind::Board, ViewParams::default());
        registry.subscribe(b, ViewKind::List, ViewParams::default());

        assert_eq!(registry.drop_connection(a), 2);
        assert_eq!(registry.drop_connection(a), 0);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe(connection(), ViewKind::List, ViewParams::default());
        assert!(registry.unsubscribe(&sub.id));
        assert!(!registry.unsubscribe(&sub.id));
        assert!(!registry.unsubscribe("never-existed"));
    }

    #[test]
    fn test_record_sent_ignores_vanished_subscription() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe(connection(), ViewKind::List, ViewParams::default());
        registry.unsubscribe(&sub.id);
        registry.record_sent(&sub.id, "digest".to_string());
        assert!(registry.get(&sub.id).is_none());
    }

    #[test]
    fn test_flush_digests() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe(connection(), ViewKind::List, ViewParams::default());
        registry.record_sent(&sub.id, "digest".to_string());
        assert!(registry.get(&sub.id).unwrap().last_digest.is_some());
        registry.flush_digests();
        assert!(registry.get(&sub.id).unwrap().last_digest.is_none());
    }
}
