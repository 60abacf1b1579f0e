// src/tasks/copy.rs

//! Plain copies (fonts, HTML) and vendor asset copies.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use minify_js::{minify, Session, TopLevelMode};
use tracing::warn;

use crate::config::SiteConfig;
use crate::tasks::pipeline::{changed_sources, copy_all, write_output};
use crate::tasks::styles::finish_css;
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};

/// Copies fonts into `fonts.dest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fonts;

impl Task for Fonts {
    fn name(&self) -> &'static str {
        "fonts"
    }

    fn description(&self) -> &'static str {
        "copy fonts changed since the last run"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.fonts.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let name = self.name();
        blocking(ctx, move |ctx| {
            let mut report = TaskReport::default();
            let sources = changed_sources(ctx, name, &ctx.config.fonts.src, &mut report)?;
            copy_all(ctx, &sources, &ctx.config.fonts.dest, &mut report)?;
            Ok(report)
        })
    }
}

/// Copies HTML pages into `copy.html.dest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyHtml;

impl Task for CopyHtml {
    fn name(&self) -> &'static str {
        "copy_html"
    }

    fn description(&self) -> &'static str {
        "copy HTML pages changed since the last run"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.copy.html.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let name = self.name();
        blocking(ctx, move |ctx| {
            let mut report = TaskReport::default();
            let sources = changed_sources(ctx, name, &ctx.config.copy.html.src, &mut report)?;
            copy_all(ctx, &sources, &ctx.config.copy.html.dest, &mut report)?;
            Ok(report)
        })
    }
}

/// Minifies vendor stylesheets and copies vendor scripts.
///
/// Other file types are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyVendors;

impl Task for CopyVendors {
    fn name(&self) -> &'static str {
        "copy_vendors"
    }

    fn description(&self) -> &'static str {
        "minify vendor stylesheets and scripts"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        let vendors = &cfg.copy.vendors;
        let mut dirs = vec![vendors.css_dest().clone()];
        if vendors.js_dest() != vendors.css_dest() {
            dirs.push(vendors.js_dest().clone());
        }
        dirs
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let name = self.name();
        blocking(ctx, move |ctx| {
            let mut report = TaskReport::default();
            let vendors = &ctx.config.copy.vendors;
            let css_dest = ctx.resolve(vendors.css_dest());
            let js_dest = ctx.resolve(vendors.js_dest());

            for source in changed_sources(ctx, name, &vendors.src, &mut report)? {
                match source.extension().as_str() {
                    "css" => {
                        let css = ctx.fs.read_to_string(&source.path)?;
                        let minified = finish_css(&css, source.file_name(), true)
                            .with_context(|| format!("minifying {:?}", source.path))?;
                        write_output(ctx, &source.dest_in(&css_dest), minified.as_bytes(), &mut report)?;
                    }
                    "js" => {
                        let code = ctx.fs.read(&source.path)?;
                        let minified = minify_script(&code).unwrap_or_else(|err| {
                            warn!(src = ?source.path, error = %err, "script not minified; copying as is");
                            code
                        });
                        write_output(ctx, &source.dest_in(&js_dest), &minified, &mut report)?;
                    }
                    _ => report.record_skip(),
                }
            }

            Ok(report)
        })
    }
}

/// Minify a classic (non-module) script.
pub fn minify_script(code: &[u8]) -> Result<Vec<u8>> {
    let session = Session::new();
    let mut out = Vec::with_capacity(code.len());
    minify(&session, TopLevelMode::Global, code, &mut out).map_err(|err| anyhow!("minifying script: {err:?}"))?;
    Ok(out)
}
