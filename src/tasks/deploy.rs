// src/tasks/deploy.rs

use std::path::PathBuf;

use anyhow::bail;
use tracing::warn;

use crate::config::{DeploySection, SiteConfig};
use crate::exec::command::run_shell;
use crate::tasks::{Task, TaskContext, TaskFuture, TaskReport};
use crate::types::Mode;

/// Deploy command line for `mode`.
pub fn deploy_command(section: &DeploySection, mode: Mode) -> String {
    if mode.is_production() && !section.prod_flag.trim().is_empty() {
        format!("{} {}", section.command, section.prod_flag)
    } else {
        section.command.clone()
    }
}

/// Runs the deploy command from the project root.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deploy;

impl Task for Deploy {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn description(&self) -> &'static str {
        "run the deploy command"
    }

    fn write_set(&self, _cfg: &SiteConfig) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let section = &ctx.config.deploy;
            let line = deploy_command(section, ctx.mode);
            let status = run_shell(self.name(), &line, &ctx.root).await?;

            if !status.success() {
                if section.fail_on_error {
                    bail!("`{line}` exited with {status}");
                }
                warn!(cmd = %line, %status, "deploy command failed; ignoring");
            }
            Ok(TaskReport::default())
        })
    }
}
