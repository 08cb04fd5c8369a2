//! WebSocket wire protocol.
//!
//! JSON text frames tagged the same way the HTTP-side messages are.
//! All `view_update`s are server-initiated; a client never asks for a
//! refresh, it only declares or withdraws interest.

use serde::{Deserialize, Serialize};

use crate::views::{ViewKind, ViewParams, ViewPayload};

/// Messages a client may send.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Declare interest in a view. Re-subscribing to the same view kind
    /// replaces the previous parameters instead of stacking.
    Subscribe {
        view_kind: ViewKind,
        #[serde(default)]
        parameters: ViewParams,
    },
    /// Withdraw a single subscription.
    Unsubscribe { subscription_id: String },
    /// Liveness reply to a server ping.
    HeartbeatPong,
}

/// Messages the server may send.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a subscribe and hands back the subscription id.
    Subscribed {
        subscription_id: String,
        view_kind: ViewKind,
    },
    /// A freshly computed view for one subscription.
    ViewUpdate {
        subscription_id: String,
        payload: ViewPayload,
    },
    /// Liveness probe; the client should answer with `heartbeat_pong`.
    HeartbeatPing,
    /// A protocol-level problem with the last request. The connection
    /// stays open.
    Error { message: String },
}
