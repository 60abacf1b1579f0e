// src/presets.rs

//! The `build` and `dev` graphs and the dev-mode watch bindings.

use crate::config::{Globs, SiteConfig};
use crate::dag::{parallel, sequence, task, GraphSpec, NodeSpec};

/// Production-ready build, finishing with a deploy.
pub fn build_graph() -> GraphSpec {
    sequence([
        task("env"),
        parallel(["clean_dist", "clean_cache"]),
        task("vendors"),
        parallel(["sass", "js", "fonts", "images", "copy_html"]),
        parallel(["webp", "html"]),
        task("deploy"),
    ])
}

/// Warm-up build run before the dev server starts watching.
pub fn dev_graph() -> GraphSpec {
    sequence([
        parallel(["env", "clean_dist"]),
        task("vendors"),
        parallel(["sass", "js", "fonts", "images", "copy_html"]),
        task("webp"),
    ])
}

/// Glob set bound to a short task sequence in watch mode.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub name: &'static str,
    pub globs: Globs,
    pub graph: GraphSpec,
}

impl WatchBinding {
    fn new<const N: usize>(name: &'static str, globs: &Globs, tasks: [&str; N]) -> Self {
        Self {
            name,
            globs: globs.clone(),
            graph: sequence(tasks),
        }
    }

    /// Nodes of this binding, prefixed with its name.
    pub fn nodes(&self) -> Vec<NodeSpec> {
        self.graph.compile_with_prefix(Some(self.name))
    }
}

/// Every watch binding, each ending in a browser reload.
pub fn watch_bindings(cfg: &SiteConfig) -> Vec<WatchBinding> {
    let watch = &cfg.watch;
    vec![
        WatchBinding::new("scss", &watch.scss, ["sass", "reload"]),
        WatchBinding::new("js", &watch.js, ["js", "reload"]),
        WatchBinding::new("html", &watch.html, ["copy_html", "reload"]),
        WatchBinding::new("fonts", &watch.fonts, ["fonts", "reload"]),
        WatchBinding::new("images", &watch.images, ["images", "webp", "reload"]),
    ]
}

/// All bindings combined into one node list.
pub fn watch_nodes(bindings: &[WatchBinding]) -> Vec<NodeSpec> {
    bindings.iter().flat_map(WatchBinding::nodes).collect()
}
