//! WebSocket handler for the push protocol.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt, Sink, Stream};
use tracing::{debug, error, info, warn};

use pulseboard_core::protocol::{ClientMessage, ServerMessage};

use crate::connections::ConnectionId;
use crate::engine::Engine;
use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket: WebSocket| handle_socket(socket, state))
}

/// Drive one WebSocket connection until it closes.
///
/// Send and receive run as separate tasks racing in a `select!`: when the
/// client hangs up the receive side finishes, and when the connection is
/// closed server-side (heartbeat sweep, drop) the outbound queue closes and
/// the send side finishes. Either way the loser is aborted and the socket
/// is dropped, so a swept connection never leaks a live socket.
async fn handle_socket<S>(socket: S, state: AppState)
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Send + Unpin + 'static,
{
    let engine = state.engine;
    let (conn_id, mut outbound) = engine.connections.accept();
    // The upgrade already completed, so the handshake is done.
    engine.connections.mark_open(conn_id);
    info!(connection = %conn_id, total = engine.connections.count(), "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    // Forward queued messages to the socket until the queue closes.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let recv_engine = Arc::clone(&engine);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    recv_engine.connections.touch(conn_id);
                    handle_client_message(&recv_engine, conn_id, &text).await;
                }
                Message::Pong(_) => recv_engine.connections.touch(conn_id),
                Message::Close(_) => {
                    debug!(connection = %conn_id, "WebSocket client sent close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Synchronous teardown: no send may target this connection afterwards.
    engine.drop_connection(conn_id);
    info!(connection = %conn_id, "WebSocket client disconnected");
}

/// Dispatch one parsed (or unparsable) client frame.
///
/// Protocol errors answer with an `error` message and leave the connection
/// open.
async fn handle_client_message(engine: &Engine, conn_id: ConnectionId, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(connection = %conn_id, error = %e, "Malformed client message");
            let _ = engine.connections.send_control(
                conn_id,
                ServerMessage::Error {
                    message: format!("malformed message: {}", e),
                },
            );
            return;
        }
    };

    match msg {
        ClientMessage::Subscribe {
            view_kind,
            parameters,
        } => {
            if let Err(e) = engine.subscribe(conn_id, view_kind, parameters).await {
                warn!(connection = %conn_id, error = %e, "Subscribe rejected");
                let _ = engine.connections.send_control(
                    conn_id,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            engine.unsubscribe(&subscription_id);
        }
        ClientMessage::HeartbeatPong => {
            engine.connections.touch(conn_id);
        }
    }
}
