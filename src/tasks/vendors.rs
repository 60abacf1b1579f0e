// src/tasks/vendors.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{Globs, SiteConfig};
use crate::fs::FileSystem;
use crate::tasks::pipeline::{collect_sources, write_output};
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};

/// Directory holding installed packages, relative to the project root.
pub const PACKAGES_DIR: &str = "node_modules";

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// Names of the runtime dependencies listed in the manifest at `path`.
///
/// A missing manifest lists nothing.
pub fn manifest_dependencies(fs: &dyn FileSystem, path: &Path) -> Result<Vec<String>> {
    if !fs.is_file(path) {
        warn!(manifest = ?path, "package manifest not found");
        return Ok(Vec::new());
    }

    let raw = fs.read_to_string(path)?;
    let manifest: Manifest =
        serde_json::from_str(&raw).with_context(|| format!("parsing manifest {:?}", path))?;
    Ok(manifest.dependencies.into_keys().collect())
}

/// Copies every dependency's files out of `node_modules`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vendors;

impl Task for Vendors {
    fn name(&self) -> &'static str {
        "vendors"
    }

    fn description(&self) -> &'static str {
        "copy package dependencies into the vendors directory"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.vendors.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        blocking(ctx, |ctx| {
            let mut report = TaskReport::default();
            let manifest = ctx.resolve(&ctx.config.vendors.manifest);
            let deps = manifest_dependencies(ctx.fs.as_ref(), &manifest)?;

            if deps.is_empty() {
                info!("{}", ctx.config.vendors.notification);
                return Ok(report);
            }

            let globs = Globs::new(
                deps.iter()
                    .map(|dep| format!("{PACKAGES_DIR}/{dep}/**/*.*")),
            );
            let sources = collect_sources(
                ctx.fs.as_ref(),
                &ctx.root,
                &globs,
                Some(Path::new(PACKAGES_DIR)),
            )?;

            let dest = ctx.resolve(&ctx.config.vendors.dest);
            for source in &sources {
                let bytes = ctx.fs.read(&source.path)?;
                write_output(ctx, &source.dest_in(&dest), &bytes, &mut report)?;
            }

            info!(packages = deps.len(), files = report.written, "vendored dependencies");
            Ok(report)
        })
    }
}
