// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::event_handler::process_file_changes;
use crate::watch::patterns::BindingProfile;

/// Keeps the debounced watcher alive. Dropping it stops file watching.
pub struct WatcherHandle {
    _inner: Debouncer<RecommendedWatcher>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send `RuntimeEvent::TaskTriggered` for the
/// entry nodes of every binding matching a changed path.
///
/// Events are coalesced over `debounce`; one batch produces at most one
/// trigger per node.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<BindingProfile>,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();

    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => {
            let paths = events.into_iter().map(|e| e.path).collect();
            if let Err(err) = batch_tx.send(paths) {
                eprintln!("sitepipe: failed to forward watch events: {err}");
            }
        }
        Err(err) => {
            eprintln!("sitepipe: file watch error: {err}");
        }
    })
    .context("creating file watcher")?;

    debouncer
        .watcher()
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!(root = ?root, debounce_ms = debounce.as_millis() as u64, "file watcher started");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    tokio::spawn(async move {
        while let Some(paths) = batch_rx.recv().await {
            debug!(count = paths.len(), "received debounced batch");
            if !process_file_changes(fs.as_ref(), &root, &paths, &profiles, &runtime_tx).await {
                warn!("runtime channel closed; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: debouncer })
}
