//! Workspace registry.
//!
//! Tracks known workspace roots and where each one's issue database lives.
//! Registration is advisory and last-write-wins; this process is the single
//! authority. The set is persisted as JSON so registrations survive server
//! restarts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use pulseboard_core::{CoreError, CoreResult};

/// A registered workspace root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub path: String,
    pub db_path: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    entries: BTreeMap<String, WorkspaceEntry>,
    active: Option<String>,
}

/// Registry of workspaces, with change notification for interested tasks.
pub struct WorkspaceRegistry {
    inner: Mutex<RegistryFile>,
    changed: watch::Sender<u64>,
    storage: Option<PathBuf>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Mutex::new(RegistryFile::default()),
            changed,
            storage: None,
        }
    }

    /// Registry backed by a JSON file. A missing or unreadable file starts
    /// empty; persistence failures are logged, never fatal.
    pub fn with_storage(path: PathBuf) -> Self {
        let state = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Ignoring corrupt workspace registry file");
                    RegistryFile::default()
                }
            },
            Err(_) => RegistryFile::default(),
        };
        let (changed, _) = watch::channel(0);
        Self {
            inner: Mutex::new(state),
            changed,
            storage: Some(path),
        }
    }

    /// Default persistence location: `$PULSEBOARD_HOME/workspaces.json`,
    /// falling back to `~/.pulseboard/workspaces.json`.
    pub fn default_storage_path() -> Option<PathBuf> {
        let home = std::env::var("PULSEBOARD_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".pulseboard")))
            .ok()?;
        Some(home.join("workspaces.json"))
    }

    /// Upsert a workspace. Idempotent on path, last write wins.
    pub fn register(&self, path: &str, db_path: &str) -> WorkspaceEntry {
        let entry = WorkspaceEntry {
            path: path.to_string(),
            db_path: db_path.to_string(),
            registered_at: Utc::now(),
        };
        {
            let mut inner = self.lock();
            inner.entries.insert(path.to_string(), entry.clone());
            self.persist(&inner);
        }
        debug!(workspace = %path, db = %db_path, "Workspace registered");
        self.bump();
        entry
    }

    /// Point the active-workspace marker at a registered path.
    pub fn set_active(&self, path: &str) -> CoreResult<WorkspaceEntry> {
        let entry = {
            let mut inner = self.lock();
            let entry = inner
                .entries
                .get(path)
                .cloned()
                .ok_or_else(|| CoreError::WorkspaceNotFound(path.to_string()))?;
            inner.active = Some(path.to_string());
            self.persist(&inner);
            entry
        };
        self.bump();
        Ok(entry)
    }

    /// The active workspace, if one was chosen.
    pub fn active(&self) -> Option<WorkspaceEntry> {
        let inner = self.lock();
        inner
            .active
            .as_ref()
            .and_then(|path| inner.entries.get(path).cloned())
    }

    /// Look up one workspace.
    pub fn get(&self, path: &str) -> Option<WorkspaceEntry> {
        self.lock().entries.get(path).cloned()
    }

    /// All registered workspaces plus the active path.
    pub fn list(&self) -> (Vec<WorkspaceEntry>, Option<String>) {
        let inner = self.lock();
        (inner.entries.values().cloned().collect(), inner.active.clone())
    }

    /// Observe registry mutations. The value is a generation counter;
    /// receivers only care that it moved.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    fn bump(&self) {
        self.changed.send_modify(|gen| *gen += 1);
    }

    fn persist(&self, state: &RegistryFile) {
        let Some(path) = &self.storage else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_vec_pretty(state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    warn!(file = %path.display(), error = %e, "Failed to persist workspace registry");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize workspace registry"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryFile> {
        self.inner.lock().expect("workspace registry mutex poisoned")
    }
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_upsert() {
        let registry = WorkspaceRegistry::new();
        registry.register("/w/alpha", "/w/alpha/.issues/issues.db");
        registry.register("/w/alpha", "/w/alpha/other.db");
        let (entries, _) = registry.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].db_path, "/w/alpha/other.db");
    }

    #[test]
    fn test_set_active_requires_registration() {
        let registry = WorkspaceRegistry::new();
        assert!(registry.set_active("/w/ghost").is_err());
        registry.register("/w/alpha", "/db");
        registry.set_active("/w/alpha").unwrap();
        assert_eq!(registry.active().unwrap().path, "/w/alpha");
    }

    #[test]
    fn test_watch_sees_mutations() {
        let registry = WorkspaceRegistry::new();
        let rx = registry.subscribe();
        let before = *rx.borrow();
        registry.register("/w/alpha", "/db");
        assert!(*rx.borrow() > before);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("workspaces.json");

        let registry = WorkspaceRegistry::with_storage(file.clone());
        registry.register("/w/alpha", "/db");
        registry.set_active("/w/alpha").unwrap();
        drop(registry);

        let reloaded = WorkspaceRegistry::with_storage(file);
        assert_eq!(reloaded.active().unwrap().path, "/w/alpha");
    }

    #[test]
    fn test_corrupt_registry_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("workspaces.json");
        std::fs::write(&file, b"{ not json").unwrap();
        let registry = WorkspaceRegistry::with_storage(file);
        assert!(registry.list().0.is_empty());
    }
}
