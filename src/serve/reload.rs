// src/serve/reload.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast hub for reload notifications.
///
/// Every connected viewer holds a receiver; `notify` succeeds whether or not
/// anyone is listening. Each notification carries an increasing generation
/// number.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<u64>,
    generation: Arc<AtomicU64>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// New viewer subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Number of currently connected viewers.
    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Number of reloads broadcast so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Broadcast a reload; returns the number of viewers reached.
    pub fn notify(&self) -> usize {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.tx.send(generation) {
            Ok(reached) => reached,
            Err(_) => {
                debug!(generation, "reload requested with no connected viewers");
                0
            }
        }
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}
