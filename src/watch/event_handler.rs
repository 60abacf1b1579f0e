// src/watch/event_handler.rs

//! Turns debounced filesystem changes into node triggers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::NodeId;
use crate::engine::{RuntimeEvent, TriggerReason};
use crate::fs::FileSystem;
use crate::tasks::pipeline::slash_path;
use crate::watch::patterns::BindingProfile;

/// `path` relative to `root` with forward slashes.
///
/// Falls back to comparing canonical forms when the event path uses a
/// different prefix for the same directory (symlinks, `/private/var`).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slash_path(rel));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(slash_path)
}

/// Entry nodes of every binding matching at least one of `paths`.
///
/// Paths that no longer exist (removals) and directories are ignored.
pub fn triggers_for_paths(
    fs: &dyn FileSystem,
    root: &Path,
    paths: &[PathBuf],
    profiles: &[BindingProfile],
) -> BTreeSet<NodeId> {
    let mut triggers = BTreeSet::new();

    for path in paths {
        if !fs.is_file(path) {
            debug!(?path, "ignoring removed path or directory");
            continue;
        }

        let Some(rel) = relative_str(root, path) else {
            warn!("could not relativize path {:?} against root {:?}", path, root);
            continue;
        };

        for profile in profiles.iter().filter(|p| p.matches(&rel)) {
            debug!(binding = %profile.name(), path = %rel, "watch match");
            triggers.extend(profile.roots().iter().cloned());
        }
    }

    triggers
}

/// Process one debounced batch of changed paths.
///
/// Returns `false` once the runtime channel is closed.
pub async fn process_file_changes(
    fs: &dyn FileSystem,
    root: &Path,
    paths: &[PathBuf],
    profiles: &[BindingProfile],
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let triggers = triggers_for_paths(fs, root, paths, profiles);
    if triggers.is_empty() {
        return true;
    }

    info!(nodes = ?triggers, changed = paths.len(), "file change -> triggering");

    for task in triggers {
        if let Err(err) = runtime_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::FileWatch,
            })
            .await
        {
            warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
            return false;
        }
    }

    true
}
