//! Restart on source changes.
//!
//! A `notify` watcher covers `.env`, `cron/`, `www/` and `util/` under the
//! base path. In cron mode a change sets the `RESTART` flag so every
//! scheduler sharing the store drains and exits; in www mode it shuts the
//! server down. A supervisor is expected to start the process again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use leasehold_core::{LeaseStore, RESTART_KEY};

const WATCHED: &[&str] = &[".env", "cron", "www", "util"];

/// Watched entries that exist under `base`.
pub fn watch_paths(base: &Path) -> Vec<PathBuf> {
    WATCHED
        .iter()
        .map(|p| base.join(p))
        .filter(|p| p.exists())
        .collect()
}

/// Receives the path of every created, modified or removed file.
pub struct ChangeWatcher {
    _watcher: Option<RecommendedWatcher>,
    changes: mpsc::Receiver<PathBuf>,
}

impl ChangeWatcher {
    pub fn start(paths: &[PathBuf]) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel::<PathBuf>(64);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                    for path in event.paths {
                        // Full channel: a restart is already pending.
                        let _ = tx.try_send(path);
                    }
                }
            }
            Err(e) => warn!("watch error: {}", e),
        })?;

        for path in paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
            info!("Watching {}", path.display());
        }

        Ok(Self {
            _watcher: Some(watcher),
            changes: rx,
        })
    }

    #[cfg(test)]
    fn from_channel(changes: mpsc::Receiver<PathBuf>) -> Self {
        Self { _watcher: None, changes }
    }

    /// Next changed path; `None` once the watcher is gone.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        self.changes.recv().await
    }
}

/// Set `RESTART` after the first change. Store failures are retried on the next change.
pub async fn restart_on_change(store: Arc<dyn LeaseStore>, mut watcher: ChangeWatcher) {
    while let Some(path) = watcher.next_change().await {
        info!("{} changed, requesting restart", path.display());
        match store.set(RESTART_KEY, "true").await {
            Ok(()) => return,
            Err(e) => error!(error = %e, "could not set restart flag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasehold_store::MemoryStore;

    #[test]
    fn only_existing_entries_are_watched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("www")).unwrap();
        std::fs::write(dir.path().join(".env"), "").unwrap();

        let paths = watch_paths(dir.path());
        assert_eq!(paths, vec![dir.path().join(".env"), dir.path().join("www")]);
    }

    #[tokio::test]
    async fn change_sets_restart_flag() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(restart_on_change(store.clone(), ChangeWatcher::from_channel(rx)));

        tx.send(PathBuf::from("cron/helloworld")).await.unwrap();
        task.await.unwrap();
        assert_eq!(store.get(RESTART_KEY).await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn closed_watcher_leaves_flag_unset() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(4);
        drop(tx);
        restart_on_change(store.clone(), ChangeWatcher::from_channel(rx)).await;
        assert!(!store.exists(RESTART_KEY).await.unwrap());
    }
}
