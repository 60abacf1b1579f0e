// src/serve/mod.rs

//! Local dev server with live reload.
//!
//! - [`reload`] is the broadcast hub the `reload` task signals.
//! - [`server`] serves the output root and streams reload events to
//!   browsers.

pub mod reload;
pub mod server;

pub use reload::ReloadHub;
pub use server::{open_browser, start, ServerHandle, ServerOptions};

use crate::tasks::TaskContext;

impl ServerOptions {
    /// Options for serving the output root of `ctx`.
    pub fn from_context(ctx: &TaskContext) -> Self {
        let section = &ctx.config.browsersync;
        Self {
            root: ctx.resolve(&ctx.config.dist),
            port: section.port,
            debug: section.debug,
            notify: section.notify,
        }
    }
}
