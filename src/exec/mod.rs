// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests replace it with a fake implementation.
//! - [`executor_loop`] owns the loop that spawns one Tokio task per
//!   scheduled node.
//! - [`task_runner`] runs a node's registry task and reports the outcome.
//! - [`command`] runs external shell commands (bundler, deploy).

pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
