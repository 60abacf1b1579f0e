// src/watch/mod.rs

//! File watching and change bookkeeping.
//!
//! - [`patterns`] compiles each watch binding's globs.
//! - [`watcher`] runs the debounced `notify` watcher.
//! - [`event_handler`] maps changed paths to binding entry nodes.
//! - [`since`] tracks the last successful run of each task.
//! - [`hash`] is the content-hash cache used by image optimisation.
//!
//! Nothing here knows how tasks are scheduled; changes only become node
//! triggers sent to the runtime.

pub mod event_handler;
pub mod hash;
pub mod patterns;
pub mod since;
pub mod watcher;

pub use hash::{compute_hash, FileHashStore, HashStore, HashTable, SharedHashStore};
pub use patterns::{build_binding_profiles, BindingProfile};
pub use since::LastRunTracker;
pub use watcher::{spawn_watcher, WatcherHandle};
