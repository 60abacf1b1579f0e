// src/watch/since.rs

//! In-process "since last successful run" bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::debug;

/// Remembers, per registry task, the start time of its last successful
/// invocation. Clones share the same table.
///
/// Nothing is persisted: a fresh process processes every file on the first
/// invocation of each task.
#[derive(Debug, Clone, Default)]
pub struct LastRunTracker {
    inner: Arc<Mutex<HashMap<String, SystemTime>>>,
}

impl LastRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SystemTime>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start time of the last successful run of `task`, if any.
    pub fn since(&self, task: &str) -> Option<SystemTime> {
        self.lock().get(task).copied()
    }

    /// Record a successful run of `task` that started at `started`.
    pub fn record(&self, task: &str, started: SystemTime) {
        debug!(task = %task, "recording last successful run");
        self.lock().insert(task.to_string(), started);
    }
}

/// Whether a file modified at `modified` should be processed by a task
/// whose last successful run started at `since`.
pub fn is_newer(modified: SystemTime, since: Option<SystemTime>) -> bool {
    match since {
        Some(since) => modified >= since,
        None => true,
    }
}
