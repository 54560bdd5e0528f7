// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watch::path_utils::relative_str;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle stops
/// file watching and closes the path channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and forward every changed path, relative to
/// `root` with forward slashes, on `path_tx`.
///
/// Access-only events are dropped; everything else (create, modify, remove,
/// rename) is forwarded. Pattern matching is left to the receiver.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    path_tx: mpsc::UnboundedSender<String>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Closure called synchronously by notify on its own thread.
    let callback_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in &event.paths {
                    match relative_str(&callback_root, path) {
                        Some(rel) if !rel.is_empty() => {
                            debug!(path = %rel, kind = ?event.kind, "file event");
                            if path_tx.send(rel).is_err() {
                                // Receiver gone: the session is shutting down.
                                return;
                            }
                        }
                        _ => debug!(?path, "ignoring event outside project root"),
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!("file watcher started on {:?}", root);

    Ok(WatcherHandle { _inner: watcher })
}
