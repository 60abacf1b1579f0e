// src/tasks/clean.rs

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::config::SiteConfig;
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};

/// Deletes the output root.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanDist;

impl Task for CleanDist {
    fn name(&self) -> &'static str {
        "clean_dist"
    }

    fn description(&self) -> &'static str {
        "delete the output root"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.dist.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        blocking(ctx, |ctx| {
            let dist = ctx.resolve(&ctx.config.dist);
            ctx.fs
                .remove_dir_all(&dist)
                .with_context(|| format!("cleaning {:?}", dist))?;
            info!(path = ?dist, "removed output root");
            Ok(TaskReport::default())
        })
    }
}

/// Clears the image optimisation cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanCache;

impl Task for CleanCache {
    fn name(&self) -> &'static str {
        "clean_cache"
    }

    fn description(&self) -> &'static str {
        "clear the image optimisation cache"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.cache.dir.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        blocking(ctx, |ctx| {
            let mut store = ctx
                .image_cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            store.clear().context("clearing image cache")?;
            info!("image cache cleared");
            Ok(TaskReport::default())
        })
    }
}
