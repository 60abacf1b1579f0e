// src/tasks/mod.rs

//! The fixed registry of named build tasks.
//!
//! Every task implements [`Task`]: it declares the directories it writes
//! (its write-set, used by the scheduler to serialize overlapping writers)
//! and an async `run` that reports a [`TaskReport`] or an error. File
//! transforming tasks run their synchronous body on the blocking pool via
//! [`blocking`].
//!
//! The registry is built once at startup and never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;

use crate::config::SiteConfig;
use crate::dag::{DagGraph, GraphSpec, NodeSpec, WriteSets};
use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;
use crate::serve::ReloadHub;
use crate::types::Mode;
use crate::watch::hash::{self, FileHashStore, SharedHashStore};
use crate::watch::since::LastRunTracker;

pub mod clean;
pub mod copy;
pub mod deploy;
pub mod env;
pub mod html;
pub mod images;
pub mod pipeline;
pub mod reload;
pub mod scripts;
pub mod styles;
pub mod vendors;

/// Future returned by [`Task::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<TaskReport>> + Send + 'a>>;

/// A named unit of work.
pub trait Task: Send + Sync + fmt::Debug {
    /// Registry key.
    fn name(&self) -> &'static str;

    /// One-line description shown by `--dry-run`.
    fn description(&self) -> &'static str;

    /// Directories (relative to the project root) this task writes into.
    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf>;

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a>;
}

/// What a task did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Files written.
    pub written: usize,
    /// Bytes written.
    pub bytes: u64,
    /// Source files left untouched (filtered out or already up to date).
    pub skipped: usize,
}

impl TaskReport {
    pub fn record_write(&mut self, bytes: usize) {
        self.written += 1;
        self.bytes += bytes as u64;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }
}

/// Everything a task may touch, shared by all tasks of a process.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub config: Arc<SiteConfig>,
    pub mode: Mode,
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub last_runs: LastRunTracker,
    pub reload: ReloadHub,
    pub image_cache: SharedHashStore,
}

impl TaskContext {
    /// Context with a file-backed image cache under `cache.dir`.
    pub fn new(config: SiteConfig, mode: Mode, root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        let root = root.into();
        let cache = FileHashStore::new(root.join(&config.cache.dir), Arc::clone(&fs));
        Self {
            config: Arc::new(config),
            mode,
            root,
            fs,
            last_runs: LastRunTracker::new(),
            reload: ReloadHub::new(),
            image_cache: hash::shared(cache),
        }
    }

    /// Absolute (root-joined) form of a configured path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Start time of the last successful run of `task`.
    pub fn since(&self, task: &str) -> Option<SystemTime> {
        self.last_runs.since(task)
    }
}

/// Run a synchronous task body on the blocking pool.
pub fn blocking<F>(ctx: &TaskContext, body: F) -> TaskFuture<'static>
where
    F: FnOnce(&TaskContext) -> anyhow::Result<TaskReport> + Send + 'static,
{
    let ctx = ctx.clone();
    Box::pin(async move {
        tokio::task::spawn_blocking(move || body(&ctx))
            .await
            .map_err(|err| anyhow!("task body panicked or was cancelled: {err}"))?
    })
}

/// Immutable name -> task lookup table.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<&'static str, Arc<dyn Task>>,
}

impl TaskRegistry {
    /// Empty registry; add tasks with [`TaskRegistry::with`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in task.
    pub fn standard() -> Self {
        Self::empty()
            .with(env::Env)
            .with(clean::CleanDist)
            .with(clean::CleanCache)
            .with(vendors::Vendors)
            .with(styles::Sass)
            .with(scripts::Scripts)
            .with(copy::Fonts)
            .with(copy::CopyHtml)
            .with(copy::CopyVendors)
            .with(images::Images)
            .with(images::Webp)
            .with(html::MinifyHtml)
            .with(reload::Reload)
            .with(deploy::Deploy)
    }

    /// Builder step: register `task` under its own name.
    pub fn with(mut self, task: impl Task + 'static) -> Self {
        self.tasks.insert(task.name(), Arc::new(task));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Write-set of every registered task.
    pub fn write_sets(&self, cfg: &SiteConfig) -> WriteSets {
        self.tasks
            .iter()
            .map(|(name, task)| (name.to_string(), task.write_set(cfg)))
            .collect()
    }

    /// Fail with `UnknownTask` if any node names an unregistered task.
    pub fn check_nodes(&self, nodes: &[NodeSpec]) -> Result<()> {
        match nodes.iter().find(|node| !self.contains(&node.task)) {
            Some(node) => Err(SitepipeError::UnknownTask(node.task.clone())),
            None => Ok(()),
        }
    }

    /// Compile and validate a graph spec against this registry.
    pub fn compile(&self, spec: &GraphSpec) -> Result<DagGraph> {
        self.compile_nodes(spec.compile())
    }

    /// Validate an already compiled node list.
    pub fn compile_nodes(&self, nodes: Vec<NodeSpec>) -> Result<DagGraph> {
        self.check_nodes(&nodes)?;
        DagGraph::from_nodes(nodes)
    }
}
