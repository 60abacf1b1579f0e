// src/tasks/reload.rs

use std::path::PathBuf;

use tracing::info;

use crate::config::SiteConfig;
use crate::tasks::{Task, TaskContext, TaskFuture, TaskReport};

/// Tells connected browsers to reload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reload;

impl Task for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    fn description(&self) -> &'static str {
        "signal connected browsers to reload"
    }

    fn write_set(&self, _cfg: &SiteConfig) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let reached = ctx.reload.notify();
            info!(viewers = reached, "reload signalled");
            Ok(TaskReport::default())
        })
    }
}
