// src/tasks/pipeline.rs

//! Source collection and destination writing shared by the file tasks.
//!
//! A glob's *base* is the run of leading path components that contain no
//! glob syntax: for `src/scss/**/*.scss` it is `src/scss`. Matched files
//! keep their path relative to that base when written to a destination, so
//! `src/scss/pages/home.scss` lands in `<dest>/pages/home.css`.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::config::Globs;
use crate::fs::FileSystem;
use crate::tasks::{TaskContext, TaskReport};
use crate::watch::since::is_newer;

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// A matched source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Path relative to the glob base; used to place the output.
    pub rel: PathBuf,
}

impl SourceFile {
    /// Destination path under `dest` (already root-joined).
    pub fn dest_in(&self, dest: &Path) -> PathBuf {
        dest.join(&self.rel)
    }

    /// Destination path under `dest` with the extension replaced.
    pub fn dest_with_extension(&self, dest: &Path, ext: &str) -> PathBuf {
        dest.join(&self.rel).with_extension(ext)
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Lower-cased extension, empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

/// Leading components of `pattern` that contain no glob syntax.
///
/// A pattern without any glob syntax names a single file; its base is the
/// parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal = components
        .iter()
        .take_while(|c| !c.contains(GLOB_CHARS))
        .count();

    let take = if literal == components.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };

    components[..take]
        .iter()
        .filter(|c| !c.is_empty() && **c != ".")
        .collect()
}

/// Matcher for one glob; `*` does not cross `/`.
pub fn compile_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?
        .compile_matcher())
}

fn compile_set(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn normalize(pattern: &str) -> &str {
    pattern.strip_prefix("./").unwrap_or(pattern)
}

/// Relative path string with forward slashes.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every file below `dir`, sorted. A missing directory yields nothing.
pub fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(dir) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for path in fs.read_dir(&current)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Resolve `globs` against `root`.
///
/// Patterns starting with `!` exclude. Output paths are relative to each
/// include pattern's base, or to `base_override` when given. Patterns whose
/// base does not exist match nothing.
pub fn collect_sources(
    fs: &dyn FileSystem,
    root: &Path,
    globs: &Globs,
    base_override: Option<&Path>,
) -> Result<Vec<SourceFile>> {
    let (excludes, includes): (Vec<&str>, Vec<&str>) = globs
        .patterns()
        .iter()
        .map(|p| p.as_str())
        .partition(|p| p.starts_with('!'));

    let excludes: Vec<&str> = excludes
        .into_iter()
        .map(|p| normalize(&p[1..]))
        .collect();
    let exclude_set = if excludes.is_empty() {
        None
    } else {
        Some(compile_set(&excludes)?)
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in includes.into_iter().map(normalize) {
        let matcher = compile_matcher(pattern)?;
        let base = glob_base(pattern);
        let rel_base = base_override.map(Path::to_path_buf).unwrap_or_else(|| base.clone());

        for path in walk_files(fs, &root.join(&base))? {
            let Ok(rel_root) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = slash_path(rel_root);

            if !matcher.is_match(&rel_str) {
                continue;
            }
            if exclude_set.as_ref().is_some_and(|set| set.is_match(&rel_str)) {
                continue;
            }
            if !seen.insert(path.clone()) {
                continue;
            }

            let rel = rel_root
                .strip_prefix(&rel_base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| rel_root.to_path_buf());
            out.push(SourceFile { path, rel });
        }
    }

    debug!(patterns = ?globs.patterns(), matched = out.len(), "collected sources");
    Ok(out)
}

/// Keep the sources modified at or after `since`; count the rest as skipped.
pub fn filter_since(
    fs: &dyn FileSystem,
    sources: Vec<SourceFile>,
    since: Option<SystemTime>,
    report: &mut TaskReport,
) -> Result<Vec<SourceFile>> {
    if since.is_none() {
        return Ok(sources);
    }

    let mut kept = Vec::with_capacity(sources.len());
    for source in sources {
        let modified = fs.modified(&source.path)?;
        if is_newer(modified, since) {
            kept.push(source);
        } else {
            report.record_skip();
        }
    }
    Ok(kept)
}

/// Collect `globs` and apply the since-last-run filter of `task`.
pub fn changed_sources(
    ctx: &TaskContext,
    task: &str,
    globs: &Globs,
    report: &mut TaskReport,
) -> Result<Vec<SourceFile>> {
    let sources = collect_sources(ctx.fs.as_ref(), &ctx.root, globs, None)?;
    filter_since(ctx.fs.as_ref(), sources, ctx.since(task), report)
}

/// Copy every source into `dest` unchanged.
pub fn copy_all(ctx: &TaskContext, sources: &[SourceFile], dest: &Path, report: &mut TaskReport) -> Result<()> {
    let dest = ctx.resolve(dest);
    for source in sources {
        let bytes = ctx.fs.read(&source.path)?;
        write_output(ctx, &source.dest_in(&dest), &bytes, report)?;
    }
    Ok(())
}

/// Write one output file and account for it.
pub fn write_output(ctx: &TaskContext, path: &Path, bytes: &[u8], report: &mut TaskReport) -> Result<()> {
    ctx.fs
        .write(path, bytes)
        .with_context(|| format!("writing {:?}", path))?;
    report.record_write(bytes.len());
    Ok(())
}
