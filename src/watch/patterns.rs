// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::Globs;
use crate::dag::NodeId;
use crate::presets::WatchBinding;

/// Compiled glob patterns of one watch binding plus the node(s) to trigger.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths such as `"src/scss/main.scss"` into [`BindingProfile::matches`].
#[derive(Clone)]
pub struct BindingProfile {
    name: String,
    roots: Vec<NodeId>,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for BindingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingProfile")
            .field("name", &self.name)
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl BindingProfile {
    /// Compile `globs` for a binding whose entry nodes are `roots`.
    pub fn new(name: impl Into<String>, globs: &Globs, roots: Vec<NodeId>) -> Result<Self> {
        let name = name.into();
        let (excludes, includes): (Vec<&str>, Vec<&str>) = globs
            .patterns()
            .iter()
            .map(String::as_str)
            .partition(|p| p.starts_with('!'));
        let excludes: Vec<&str> = excludes.into_iter().map(|p| &p[1..]).collect();

        let include = build_globset(&includes)
            .with_context(|| format!("building watch globset for binding {name}"))?;
        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(
                build_globset(&excludes)
                    .with_context(|| format!("building exclude globset for binding {name}"))?,
            )
        };

        Ok(Self {
            name,
            roots,
            include,
            exclude,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes triggered when a matching file changes.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Whether `rel_path` (relative to the project root) belongs to this
    /// binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from string patterns (a leading `./` is ignored).
fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let pat = pat.strip_prefix("./").unwrap_or(*pat);
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// One profile per binding, triggering the binding's entry nodes.
pub fn build_binding_profiles(bindings: &[WatchBinding]) -> Result<Vec<BindingProfile>> {
    bindings
        .iter()
        .map(|binding| {
            let roots = binding
                .nodes()
                .into_iter()
                .filter(|node| node.deps.is_empty())
                .map(|node| node.id)
                .collect();
            BindingProfile::new(binding.name, &binding.globs, roots)
        })
        .collect()
}
