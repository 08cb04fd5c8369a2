//! Change source for the issue database.
//!
//! Two origins feed the same bounded channel: a filesystem watcher on the
//! active database file, and manual pokes from out-of-process writers via
//! the server's notify endpoint. Events carry no semantic content; they
//! only mean "something may have changed".

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::pool::{DbError, DbResult};

/// Where a change notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// The database file (or its WAL/journal sidecars) was touched.
    Filesystem,
    /// An external writer poked the notify endpoint.
    Manual,
}

/// A raw change notification. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent {
    pub origin: ChangeOrigin,
    pub observed_at: Instant,
}

impl ChangeEvent {
    pub fn now(origin: ChangeOrigin) -> Self {
        Self {
            origin,
            observed_at: Instant::now(),
        }
    }
}

/// Sending side of the change channel. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct ChangeTx {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChangeTx {
    /// Report a change. A full channel means a refresh is already pending,
    /// so dropping the event loses nothing.
    pub fn notify(&self, origin: ChangeOrigin) {
        if self.tx.try_send(ChangeEvent::now(origin)).is_err() {
            debug!(?origin, "Change channel full, refresh already pending");
        }
    }
}

/// Create the bounded change channel.
pub fn change_channel(capacity: usize) -> (ChangeTx, mpsc::Receiver<ChangeEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChangeTx { tx }, rx)
}

/// Filesystem watcher bound to the active database file.
///
/// Watches the parent directory non-recursively and filters events down to
/// paths starting with the database file name, which also covers SQLite's
/// `-wal` / `-journal` / `-shm` sidecars.
pub struct DbWatcher {
    watcher: RecommendedWatcher,
    target: Arc<Mutex<PathBuf>>,
    watched_dir: PathBuf,
}

impl DbWatcher {
    pub fn new(db_path: &Path, tx: ChangeTx) -> DbResult<Self> {
        let target = Arc::new(Mutex::new(db_path.to_path_buf()));
        let filter = Arc::clone(&target);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let target = filter.lock().expect("watch target mutex poisoned");
                    if event.paths.iter().any(|p| starts_with_target(p, &target)) {
                        tx.notify(ChangeOrigin::Filesystem);
                    }
                }
                Err(e) => warn!(error = %e, "Filesystem watcher error"),
            },
            Config::default(),
        )?;

        let watched_dir = watch_dir(db_path)?;
        watcher.watch(&watched_dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %watched_dir.display(), db = %db_path.display(), "Watching database");

        Ok(Self {
            watcher,
            target,
            watched_dir,
        })
    }

    /// Point the watcher at a different database, used on workspace switch.
    pub fn rebind(&mut self, db_path: &Path) -> DbResult<()> {
        let new_dir = watch_dir(db_path)?;
        if new_dir != self.watched_dir {
            self.watcher.unwatch(&self.watched_dir)?;
            self.watcher.watch(&new_dir, RecursiveMode::NonRecursive)?;
            self.watched_dir = new_dir;
        }
        *self.target.lock().expect("watch target mutex poisoned") = db_path.to_path_buf();
        debug!(db = %db_path.display(), "Watcher rebound");
        Ok(())
    }
}

fn watch_dir(db_path: &Path) -> DbResult<PathBuf> {
    db_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| DbError::NotFound(format!("{} has no parent directory", db_path.display())))
}

fn starts_with_target(path: &Path, target: &Path) -> bool {
    match (path.file_name(), target.file_name()) {
        (Some(name), Some(db_name)) => name
            .to_string_lossy()
            .starts_with(db_name.to_string_lossy().as_ref()),
        _ => false,
    }
}
