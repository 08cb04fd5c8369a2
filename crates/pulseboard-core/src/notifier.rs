//! Best-effort HTTP client for poking a running Pulseboard server.
//!
//! Used by the CLI and by out-of-process tooling to announce mutations and
//! workspaces. Failures are expected when no server is running and are only
//! debug-logged.

use std::time::Duration;

use tracing::{debug, warn};

/// Default server URL.
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4400";

/// Notifies a running server via HTTP.
#[derive(Clone)]
pub struct ServerNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl ServerNotifier {
    /// Create a notifier with default settings.
    ///
    /// Uses the `PULSEBOARD_URL` environment variable if set,
    /// otherwise defaults to `http://127.0.0.1:4400`.
    pub fn new() -> Self {
        let base_url =
            std::env::var("PULSEBOARD_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::with_url(&base_url)
    }

    /// Create a notifier with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        debug!(base_url = %base_url, "ServerNotifier initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Tell the server the issue database may have changed.
    ///
    /// This is the manual leg of the change source; writers that bypass the
    /// watched file (e.g. remote syncs) surface through the same path.
    pub async fn notify_changed(&self) {
        self.post("/internal/notify", serde_json::json!({})).await;
    }

    /// Announce a workspace to the server's registry.
    pub async fn register_workspace(&self, path: &str, db_path: &str) {
        self.post(
            "/api/workspaces",
            serde_json::json!({ "path": path, "db_path": db_path }),
        )
        .await;
    }

    /// Ask the server to switch its active workspace.
    pub async fn set_active_workspace(&self, path: &str) {
        self.post("/api/workspaces/active", serde_json::json!({ "path": path }))
            .await;
    }

    async fn post(&self, route: &str, payload: serde_json::Value) {
        let url = format!("{}{}", self.base_url, route);
        debug!(url = %url, "Sending notification");
        match self.client.post(&url).json(&payload).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(
                        url = %url,
                        status_code = %response.status(),
                        "Notification failed with status"
                    );
                }
            }
            Err(e) => {
                // Expected when no server is running.
                debug!(url = %url, error = %e, "Failed to send notification (server may not be running)");
            }
        }
    }
}

impl Default for ServerNotifier {
    fn default() -> Self {
        Self::new()
    }
}
