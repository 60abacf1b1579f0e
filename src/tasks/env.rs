// src/tasks/env.rs

use std::path::PathBuf;

use tracing::info;

use crate::config::SiteConfig;
use crate::tasks::{Task, TaskContext, TaskFuture, TaskReport};

/// Announces the build mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Env;

impl Task for Env {
    fn name(&self) -> &'static str {
        "env"
    }

    fn description(&self) -> &'static str {
        "log the build mode"
    }

    fn write_set(&self, _cfg: &SiteConfig) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            info!(mode = %ctx.mode, "running in {} mode", ctx.mode);
            Ok(TaskReport::default())
        })
    }
}
