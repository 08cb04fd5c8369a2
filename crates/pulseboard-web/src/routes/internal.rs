//! Internal notification endpoint.
//!
//! Out-of-process writers (the tracker CLI, sync daemons) call this after a
//! successful write. It feeds the same change channel as the filesystem
//! watcher; the writer gets no other coupling to the push engine.

use axum::{extract::State, http::StatusCode};
use tracing::debug;

use crate::state::AppState;

/// Accept a change poke.
pub async fn notify(State(state): State<AppState>) -> StatusCode {
    debug!("External change notification received");
    state.engine.notify_changed();
    StatusCode::OK
}
