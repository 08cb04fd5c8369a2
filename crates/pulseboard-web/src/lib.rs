//! Pulseboard Web Server
//!
//! Axum-based server exposing the WebSocket push protocol plus the small
//! HTTP surface for change pokes and workspace registration.

pub mod connections;
pub mod engine;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod subscriptions;
pub mod websocket;
pub mod workspaces;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use pulseboard_db::{change_channel, DbPool, DbWatcher};

use engine::{Engine, EngineConfig};
use state::AppState;
use workspaces::WorkspaceRegistry;

/// Server startup options.
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub registry_storage: Option<PathBuf>,
    pub config: EngineConfig,
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/workspaces", get(routes::workspaces::list))
        .route("/workspaces", post(routes::workspaces::register))
        .route("/workspaces/active", post(routes::workspaces::set_active))
        .route("/health", get(routes::health::health));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(websocket::ws_handler))
        .route("/internal/notify", post(routes::internal::notify))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the engine and its background tasks.
///
/// Split out of [`run_server`] so embedders and tests can start an engine
/// without binding a socket.
pub fn start_engine(
    db_path: &std::path::Path,
    registry_storage: Option<PathBuf>,
    config: EngineConfig,
) -> anyhow::Result<Arc<Engine>> {
    // A missing database is a fatal startup error.
    let pool = Arc::new(DbPool::open(db_path)?);

    let workspaces = match registry_storage {
        Some(path) => WorkspaceRegistry::with_storage(path),
        None => WorkspaceRegistry::new(),
    };

    let (change_tx, change_rx) = change_channel(config.change_buffer);
    let engine = Engine::new(pool, workspaces, change_tx.clone(), config.clone());

    match DbWatcher::new(db_path, change_tx) {
        Ok(watcher) => engine.attach_watcher(watcher),
        // The manual poke endpoint still works without a watcher.
        Err(e) => warn!(error = %e, "Filesystem watcher unavailable, relying on manual notifications"),
    }

    let refresh_engine = Arc::clone(&engine);
    let _scheduler = scheduler::spawn(change_rx, config.debounce_window, move || {
        let engine = Arc::clone(&refresh_engine);
        async move { engine.refresh_all().await }
    });

    let heartbeat_engine = Arc::clone(&engine);
    let _heartbeat = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            heartbeat_engine.sweep_heartbeats();
        }
    });

    Ok(engine)
}

/// Run the web server until shutdown.
pub async fn run_server(options: ServerOptions) -> anyhow::Result<()> {
    let engine = start_engine(
        &options.db_path,
        options.registry_storage,
        options.config,
    )?;
    let app = create_router(AppState::new(Arc::clone(&engine)));

    let addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        db = %options.db_path.display(),
        "Server listening on http://{} (ws://{}/ws)", addr, addr
    );

    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Shutdown requested, draining connections");
            shutdown_engine.connections.begin_drain_all();
        })
        .await?;
    Ok(())
}
