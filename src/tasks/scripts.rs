// src/tasks/scripts.rs

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::config::SiteConfig;
use crate::exec::command::run_shell;
use crate::tasks::pipeline::{collect_sources, write_output, SourceFile};
use crate::tasks::{Task, TaskContext, TaskFuture, TaskReport};
use crate::types::Mode;

/// Output file name for an entry script: `.min` is inserted before the
/// extension in production.
pub fn output_path(source: &SourceFile, dest: &Path, mode: Mode) -> PathBuf {
    let out = source.dest_in(dest);
    if !mode.is_production() {
        return out;
    }

    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match out.extension() {
        Some(ext) => format!("{stem}.min.{}", ext.to_string_lossy()),
        None => format!("{stem}.min"),
    };
    out.with_file_name(name)
}

/// Substitute `{input}` and `{output}` in a bundler command line.
pub fn bundler_command(template: &str, input: &Path, output: &Path) -> String {
    template
        .replace("{input}", &quote(input))
        .replace("{output}", &quote(output))
}

fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

/// Bundles each entry script with the configured bundler, or copies it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scripts;

impl Task for Scripts {
    fn name(&self) -> &'static str {
        "js"
    }

    fn description(&self) -> &'static str {
        "bundle entry scripts (production adds a .min suffix)"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.js.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let mut report = TaskReport::default();
            let dest = ctx.resolve(&ctx.config.js.dest);
            let sources = collect_sources(ctx.fs.as_ref(), &ctx.root, &ctx.config.js.src, None)?;

            for source in sources {
                let out = output_path(&source, &dest, ctx.mode);

                match ctx.config.js.bundler.as_deref() {
                    Some(template) => {
                        if let Some(parent) = out.parent() {
                            tokio::fs::create_dir_all(parent)
                                .await
                                .with_context(|| format!("creating {:?}", parent))?;
                        }
                        let line = bundler_command(template, &source.path, &out);
                        let status = run_shell(self.name(), &line, &ctx.root).await?;
                        if !status.success() {
                            bail!("bundler exited with {status} for {:?}", source.path);
                        }
                        let bytes = ctx.fs.read(&out).with_context(|| {
                            format!("bundler did not produce {:?}", out)
                        })?;
                        report.record_write(bytes.len());
                    }
                    None => {
                        let bytes = ctx.fs.read(&source.path)?;
                        write_output(ctx, &out, &bytes, &mut report)?;
                    }
                }
            }

            Ok(report)
        })
    }
}
