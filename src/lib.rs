// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod presets;
pub mod serve;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::dag::{task, DagGraph, GraphSpec, Scheduler};
use crate::engine::{run_once, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::SitepipeError;
use crate::exec::RealExecutorBackend;
use crate::fs::RealFileSystem;
use crate::presets::{build_graph, dev_graph, watch_bindings, watch_nodes};
use crate::serve::{open_browser, ServerOptions};
use crate::tasks::{TaskContext, TaskRegistry};
use crate::types::Mode;
use crate::watch::{build_binding_profiles, spawn_watcher};

/// What the CLI task argument resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Run a graph once and exit.
    Once(GraphSpec),
    /// Run the warm-up graph, then serve and watch.
    Dev(GraphSpec),
    /// Serve and watch without a warm-up build.
    Serve,
}

impl Plan {
    /// Resolve `dev`, `build`, `serve` or a registry task name.
    pub fn resolve(name: &str, registry: &TaskRegistry) -> errors::Result<Self> {
        match name {
            "dev" => Ok(Plan::Dev(dev_graph())),
            "build" => Ok(Plan::Once(build_graph())),
            "serve" => Ok(Plan::Serve),
            other if registry.contains(other) => Ok(Plan::Once(task(other))),
            other => Err(SitepipeError::UnknownTask(other.to_string())),
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, the task registry, the graph runtime and,
/// for `dev`/`serve`, the dev server, watcher and Ctrl-C handling.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let mode = Mode::from_prod_flag(args.prod);
    let registry = Arc::new(TaskRegistry::standard());
    let plan = Plan::resolve(&args.task, &registry)?;

    if args.dry_run {
        print_dry_run(&plan, &registry, &cfg, mode)?;
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    info!(task = %args.task, %mode, root = ?root, "starting sitepipe");
    let ctx = TaskContext::new(cfg, mode, root, Arc::new(RealFileSystem));

    match plan {
        Plan::Once(spec) => run_graph(&spec, registry, ctx).await?,
        Plan::Dev(spec) => {
            run_graph(&spec, Arc::clone(&registry), ctx.clone()).await?;
            serve_and_watch(registry, ctx).await?;
        }
        Plan::Serve => serve_and_watch(registry, ctx).await?,
    }

    Ok(())
}

/// Execute `spec` once with the real executor.
///
/// Returns `TaskFailed` for the first failing task.
pub async fn run_graph(
    spec: &GraphSpec,
    registry: Arc<TaskRegistry>,
    ctx: TaskContext,
) -> errors::Result<()> {
    let graph = registry.compile(spec)?;
    let scheduler = Scheduler::new(graph, &registry.write_sets(&ctx.config));

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(registry, ctx, rt_tx.clone());

    run_once(scheduler, rt_tx, rt_rx, executor).await
}

/// Serve the output root and re-run watch bindings until Ctrl-C.
pub async fn serve_and_watch(registry: Arc<TaskRegistry>, ctx: TaskContext) -> errors::Result<()> {
    let bindings = watch_bindings(&ctx.config);
    let graph = registry.compile_nodes(watch_nodes(&bindings))?;
    let profiles = build_binding_profiles(&bindings)?;
    let scheduler = Scheduler::new(graph, &registry.write_sets(&ctx.config));

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(registry, ctx.clone(), rt_tx.clone());

    let server = serve::start(ServerOptions::from_context(&ctx), ctx.reload.clone()).await?;
    info!(url = %server.url(), "serving output root");
    if ctx.config.browsersync.open {
        open_browser(&server.url());
    }

    let watch = &ctx.config.watch;
    let _watcher = spawn_watcher(
        ctx.root.clone(),
        profiles,
        Duration::from_millis(watch.debounce_ms),
        rt_tx.clone(),
    )?;

    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let core = CoreRuntime::new(
        scheduler,
        watch.while_running,
        watch.queue_length,
        RuntimeOptions::watching(),
    );
    let result = Runtime::new(core, rt_rx, executor).run().await;

    server.shutdown();
    result
}

/// Project root: the directory containing the config file.
///
/// A bare file name (parent = "") means the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the compiled plan without executing anything.
fn print_dry_run(
    plan: &Plan,
    registry: &TaskRegistry,
    cfg: &config::SiteConfig,
    mode: Mode,
) -> errors::Result<()> {
    println!("sitepipe dry-run ({mode})");
    println!();

    match plan {
        Plan::Once(spec) => print_graph("run", &registry.compile(spec)?, registry),
        Plan::Dev(spec) => {
            print_graph("warm-up", &registry.compile(spec)?, registry);
            print_watch(registry, cfg)?;
        }
        Plan::Serve => print_watch(registry, cfg)?,
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_graph(title: &str, graph: &DagGraph, registry: &TaskRegistry) {
    println!("{title} ({} nodes):", graph.len());
    for node in graph.nodes() {
        let task_name = graph.task_of(node).unwrap_or(node);
        let description = registry
            .get(task_name)
            .map(|t| t.description())
            .unwrap_or_default();
        println!("  - {node}: {description}");
        let deps = graph.dependencies_of(node);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }
    println!();
}

fn print_watch(registry: &TaskRegistry, cfg: &config::SiteConfig) -> errors::Result<()> {
    let bindings = watch_bindings(cfg);
    println!(
        "serve: port {} (debounce {}ms, while running: {:?})",
        cfg.browsersync.port, cfg.watch.debounce_ms, cfg.watch.while_running
    );
    for binding in &bindings {
        println!("  watch {:?} -> {}", binding.globs.patterns(), binding.name);
    }
    println!();
    print_graph("watch", &registry.compile_nodes(watch_nodes(&bindings))?, registry);
    Ok(())
}
