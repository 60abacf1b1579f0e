// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::SiteConfigBuilder;
use crate::common::{init_tracing, with_timeout, TestResult};

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use sitepipe::dag::{sequence, DagGraph, Scheduler};
use sitepipe::engine::{
    run_once, CoreCommand, CoreRuntime, CoreStep, Runtime, RuntimeEvent, RuntimeOptions,
    TaskOutcome, TriggerReason, TriggerWhileRunningBehaviour,
};
use sitepipe::errors::SitepipeError;
use sitepipe::presets::{build_graph, watch_bindings, watch_nodes};
use sitepipe::tasks::TaskRegistry;
use sitepipe_test_utils::fake_executor::FakeExecutor;

fn build_scheduler() -> Result<Scheduler, SitepipeError> {
    let cfg = SiteConfigBuilder::new().build();
    let registry = TaskRegistry::standard();
    let graph = registry.compile(&build_graph())?;
    Ok(Scheduler::new(graph, &registry.write_sets(&cfg)))
}

fn watch_scheduler() -> Result<Scheduler, SitepipeError> {
    let cfg = SiteConfigBuilder::new().build();
    let graph = DagGraph::from_nodes(watch_nodes(&watch_bindings(&cfg)))?;
    Ok(Scheduler::without_write_sets(graph))
}

fn dispatched(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .flat_map(|cmd| match cmd {
            CoreCommand::DispatchTasks(tasks) => tasks.iter().map(|t| t.name.clone()).collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn trigger(node: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: node.to_string(),
        reason: TriggerReason::FileWatch,
    }
}

fn done(node: &str) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        task: node.to_string(),
        outcome: TaskOutcome::Success,
    }
}

async fn wait_for_runs(executed: &Arc<Mutex<Vec<String>>>, count: usize) {
    with_timeout(async {
        while executed.lock().unwrap().len() < count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn build_graph_runs_every_node_once_in_dependency_order() -> TestResult {
    init_tracing();

    let scheduler = build_scheduler()?;
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));

    with_timeout(run_once(scheduler, tx, rx, executor)).await?;

    let order = executed.lock().unwrap().clone();
    let pos = |name: &str| {
        order
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("{name} never ran: {order:?}"))
    };

    assert_eq!(order.len(), build_graph().task_names().len());
    assert_eq!(order.first().map(String::as_str), Some("env"));
    assert_eq!(order.last().map(String::as_str), Some("deploy"));

    assert!(pos("clean_dist") < pos("vendors"));
    assert!(pos("clean_cache") < pos("vendors"));
    for asset in ["sass", "js", "fonts", "images", "copy_html"] {
        assert!(pos("vendors") < pos(asset), "{asset} ran before vendors");
        assert!(pos(asset) < pos("webp"), "{asset} ran after webp");
        assert!(pos(asset) < pos("html"), "{asset} ran after html");
    }
    Ok(())
}

#[tokio::test]
async fn failing_task_aborts_the_graph_with_its_name() -> TestResult {
    init_tracing();

    let scheduler = build_scheduler()?;
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed)).failing(["sass"]);

    let err = with_timeout(run_once(scheduler, tx, rx, executor))
        .await
        .unwrap_err();

    match err {
        SitepipeError::TaskFailed { task, message } => {
            assert_eq!(task, "sass");
            assert!(message.contains("simulated failure"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }

    let order = executed.lock().unwrap().clone();
    assert!(!order.contains(&"webp".to_string()));
    assert!(!order.contains(&"deploy".to_string()));
    Ok(())
}

#[tokio::test]
async fn empty_graph_completes_immediately() -> TestResult {
    let graph = DagGraph::from_nodes(sequence(Vec::<&str>::new()).compile())?;
    let (tx, rx) = mpsc::channel(8);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));

    with_timeout(run_once(Scheduler::without_write_sets(graph), tx, rx, executor)).await?;
    assert!(executed.lock().unwrap().is_empty());
    Ok(())
}

fn watch_core(behaviour: TriggerWhileRunningBehaviour) -> Result<CoreRuntime, SitepipeError> {
    Ok(CoreRuntime::new(
        watch_scheduler()?,
        behaviour,
        1,
        RuntimeOptions::watching(),
    ))
}

/// Two bindings running at once, each re-triggered while in flight.
fn retrigger_during_run(core: &mut CoreRuntime) -> CoreStep {
    assert_eq!(dispatched(&core.step(trigger("scss/sass"))), vec!["scss/sass"]);
    assert_eq!(
        dispatched(&core.step(trigger("html/copy_html"))),
        vec!["html/copy_html"]
    );

    assert!(core.step(trigger("scss/sass")).commands.is_empty());
    assert!(core.step(trigger("html/copy_html")).commands.is_empty());
    assert!(!core.queue_is_empty());

    assert_eq!(dispatched(&core.step(done("scss/sass"))), vec!["scss/reload"]);
    assert_eq!(dispatched(&core.step(done("html/copy_html"))), vec!["html/reload"]);
    assert!(dispatched(&core.step(done("scss/reload"))).is_empty());

    core.step(done("html/reload"))
}

#[test]
fn queue_behaviour_replays_every_trigger_after_the_run() -> TestResult {
    let mut core = watch_core(TriggerWhileRunningBehaviour::Queue)?;

    let step = retrigger_during_run(&mut core);

    assert!(step.keep_running);
    assert_eq!(dispatched(&step), vec!["html/copy_html", "scss/sass"]);
    assert!(core.queue_is_empty());
    Ok(())
}

#[test]
fn cancel_behaviour_keeps_only_the_latest_trigger() -> TestResult {
    let mut core = watch_core(TriggerWhileRunningBehaviour::Cancel)?;

    let step = retrigger_during_run(&mut core);

    assert!(step.keep_running);
    assert_eq!(dispatched(&step), vec!["html/copy_html"]);
    Ok(())
}

#[test]
fn failures_in_watch_mode_do_not_stop_the_runtime() -> TestResult {
    let mut core = watch_core(TriggerWhileRunningBehaviour::Queue)?;

    core.step(trigger("js/js"));
    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "js/js".to_string(),
        outcome: TaskOutcome::Failed("bundler exited with 1".to_string()),
    });

    assert!(step.keep_running);
    assert!(step.commands.is_empty());
    assert!(core.is_idle());

    assert_eq!(dispatched(&core.step(trigger("js/js"))), vec!["js/js"]);
    Ok(())
}

#[tokio::test]
async fn watch_runtime_runs_until_shutdown() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    let core = watch_core(TriggerWhileRunningBehaviour::Queue)?;

    let handle = tokio::spawn(Runtime::new(core, rx, executor).run());

    tx.send(trigger("fonts/fonts")).await?;
    wait_for_runs(&executed, 2).await;

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;

    assert_eq!(
        executed.lock().unwrap().clone(),
        vec!["fonts/fonts".to_string(), "fonts/reload".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn watch_runtime_survives_a_failing_binding() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor =
        FakeExecutor::new(tx.clone(), Arc::clone(&executed)).failing(["scss/sass"]);
    let core = watch_core(TriggerWhileRunningBehaviour::Queue)?;

    let handle = tokio::spawn(Runtime::new(core, rx, executor).run());

    tx.send(trigger("scss/sass")).await?;
    wait_for_runs(&executed, 1).await;
    tx.send(trigger("fonts/fonts")).await?;
    wait_for_runs(&executed, 3).await;

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;

    let order = executed.lock().unwrap().clone();
    assert!(!order.contains(&"scss/reload".to_string()));
    assert!(order.contains(&"fonts/reload".to_string()));
    Ok(())
}
