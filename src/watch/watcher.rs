// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::watch::trigger::WatchTrigger;

/// Keeps the filesystem watcher and its forwarding task alive.
///
/// Dropping the handle stops watching and tears down every binding.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    forwarder: JoinHandle<()>,
    trigger: Arc<WatchTrigger>,
}

impl WatcherHandle {
    pub fn trigger(&self) -> &WatchTrigger {
        &self.trigger
    }

    /// Stop every binding and cancel the runs they started.
    pub fn shutdown(&self) {
        self.trigger.shutdown();
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("bindings", &self.trigger.binding_count())
            .finish_non_exhaustive()
    }
}

/// Watch `root` recursively and hand every changed path (relative to `root`)
/// to `trigger`.
pub fn spawn_watcher(root: impl Into<PathBuf>, trigger: Arc<WatchTrigger>) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    // notify calls back on its own thread; hop into the runtime via a channel.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("watch event dropped; forwarder stopped");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), bindings = trigger.binding_count(), "file watcher started");

    let forwarder = {
        let trigger = Arc::clone(&trigger);
        let root = root.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                for rel in changed_paths(&root, &event) {
                    trigger.dispatch(&rel);
                }
            }
        })
    };

    Ok(WatcherHandle {
        _inner: watcher,
        forwarder,
        trigger,
    })
}

/// Distinct project-relative paths touched by `event`. Read-only access
/// events are not changes.
fn changed_paths(root: &Path, event: &Event) -> BTreeSet<String> {
    if matches!(event.kind, EventKind::Access(_)) {
        return BTreeSet::new();
    }

    event
        .paths
        .iter()
        .filter_map(|path| match relative_to(root, path) {
            Some(rel) => Some(rel),
            None => {
                debug!(path = %path.display(), "change outside project root ignored");
                None
            }
        })
        .collect()
}

/// `path` relative to `root` with forward slashes, or `None` when it does not
/// live under `root`.
///
/// Falls back to comparing canonical forms, since some platforms report
/// events under a different absolute prefix (macOS `/private/var`). A path
/// that no longer exists cannot be canonicalized, so deletions rely on the
/// direct prefix match.
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let canon = path.canonicalize().ok()?;
            canon.strip_prefix(root).ok()?.to_path_buf()
        }
    };

    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() { None } else { Some(rel) }
}
