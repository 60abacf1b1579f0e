// tests/scheduler_semantics.rs

mod common;
use crate::common::{builders, TestResult};

use std::path::PathBuf;

use sitepipe::dag::{parallel, sequence, task, DagGraph, GraphSpec, ScheduledTask, Scheduler, TaskRunState, WriteSets};
use sitepipe::config::from_yaml_str;
use sitepipe::engine::TaskOutcome;
use sitepipe::tasks::TaskRegistry;

fn scheduler_for(spec: &GraphSpec, write_sets: &WriteSets) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let graph = DagGraph::from_nodes(spec.compile())?;
    Ok(Scheduler::new(graph, write_sets))
}

fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.name.as_str()).collect()
}

fn writes(entries: &[(&str, &[&str])]) -> WriteSets {
    entries
        .iter()
        .map(|(task, dirs)| {
            (
                task.to_string(),
                dirs.iter().map(PathBuf::from).collect::<Vec<_>>(),
            )
        })
        .collect()
}

#[test]
fn sequence_members_start_only_after_the_previous_one_succeeded() -> TestResult {
    let mut s = scheduler_for(&sequence(["a", "b", "c"]), &WriteSets::new())?;

    let ready = s.handle_trigger("a");
    assert_eq!(names(&ready), vec!["a"]);
    assert_eq!(s.run_state_of("b"), Some(TaskRunState::Pending));

    assert_eq!(names(&s.handle_completion("a", TaskOutcome::Success)), vec!["b"]);
    assert_eq!(names(&s.handle_completion("b", TaskOutcome::Success)), vec!["c"]);
    assert!(s.handle_completion("c", TaskOutcome::Success).is_empty());

    assert!(s.is_idle());
    Ok(())
}

#[test]
fn parallel_members_are_dispatched_together() -> TestResult {
    let spec = sequence([task("env"), parallel(["x", "y", "z"]), task("done")]);
    let mut s = scheduler_for(&spec, &WriteSets::new())?;

    s.handle_trigger("env");
    let ready = s.handle_completion("env", TaskOutcome::Success);
    assert_eq!(names(&ready), vec!["x", "y", "z"]);

    assert!(s.handle_completion("y", TaskOutcome::Success).is_empty());
    assert!(s.handle_completion("x", TaskOutcome::Success).is_empty());
    assert_eq!(names(&s.handle_completion("z", TaskOutcome::Success)), vec!["done"]);
    Ok(())
}

#[test]
fn failure_fails_dependents_but_lets_siblings_finish() -> TestResult {
    let spec = sequence([parallel(["a", "d"]), task("b"), task("c")]);
    let mut s = scheduler_for(&spec, &WriteSets::new())?;

    s.start_new_run();
    s.handle_trigger("a");
    s.handle_trigger("d");

    let step = s.step_completion("a", TaskOutcome::Failed("boom".into()));
    assert!(step.newly_scheduled.is_empty());
    let mut failed = step.newly_failed.clone();
    failed.sort();
    assert_eq!(failed, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    assert!(!step.run_just_finished);

    assert_eq!(s.run_state_of("d"), Some(TaskRunState::Running));
    let step = s.step_completion("d", TaskOutcome::Success);
    assert!(step.run_just_finished);
    assert!(s.is_idle());
    Ok(())
}

#[test]
fn overlapping_write_sets_never_run_at_the_same_time() -> TestResult {
    let spec = parallel(["clean_dist", "sass", "fonts"]);
    let sets = writes(&[
        ("clean_dist", &["dist"]),
        ("sass", &["dist/css"]),
        ("fonts", &["assets/fonts"]),
    ]);
    let mut s = scheduler_for(&spec, &sets)?;

    s.start_new_run();
    let mut ready = s.handle_trigger("clean_dist");
    ready.extend(s.handle_trigger("sass"));
    ready.extend(s.handle_trigger("fonts"));

    assert_eq!(names(&ready), vec!["clean_dist", "fonts"]);
    assert_eq!(s.run_state_of("sass"), Some(TaskRunState::Pending));

    let ready = s.handle_completion("clean_dist", TaskOutcome::Success);
    assert_eq!(names(&ready), vec!["sass"]);
    Ok(())
}

#[test]
fn dot_prefixed_destinations_still_serialize_writers() -> TestResult {
    let yaml = builders::SITE_CONFIG_YAML.replace(
        "  html:\n    src: \"src/**/*.html\"\n    dest: \"dist\"",
        "  html:\n    src: \"src/**/*.html\"\n    dest: \"./dist/\"",
    );
    let cfg = from_yaml_str(&yaml)?;
    assert_eq!(cfg.copy.html.dest, PathBuf::from("./dist/"));

    let registry = TaskRegistry::standard();
    let graph = registry.compile(&parallel(["sass", "copy_html"]))?;
    let mut s = Scheduler::new(graph, &registry.write_sets(&cfg));

    s.start_new_run();
    let mut ready = s.handle_trigger("sass");
    ready.extend(s.handle_trigger("copy_html"));
    assert_eq!(names(&ready), vec!["sass"]);
    assert_eq!(s.run_state_of("copy_html"), Some(TaskRunState::Pending));

    let ready = s.handle_completion("sass", TaskOutcome::Success);
    assert_eq!(names(&ready), vec!["copy_html"]);
    Ok(())
}

#[test]
fn parent_components_are_resolved_before_comparing() -> TestResult {
    let spec = parallel(["a", "b"]);
    let sets = writes(&[("a", &["build/../dist"]), ("b", &["dist/img"])]);
    let mut s = scheduler_for(&spec, &sets)?;

    s.start_new_run();
    let mut ready = s.handle_trigger("a");
    ready.extend(s.handle_trigger("b"));
    assert_eq!(names(&ready), vec!["a"]);
    Ok(())
}

#[test]
fn disjoint_write_sets_run_concurrently() -> TestResult {
    let spec = parallel(["sass", "js"]);
    let sets = writes(&[("sass", &["dist/css"]), ("js", &["dist/js"])]);
    let mut s = scheduler_for(&spec, &sets)?;

    s.start_new_run();
    let mut ready = s.handle_trigger("sass");
    ready.extend(s.handle_trigger("js"));
    assert_eq!(names(&ready), vec!["sass", "js"]);
    Ok(())
}

#[test]
fn abort_fails_every_unsettled_node() -> TestResult {
    let mut s = scheduler_for(&sequence(["a", "b"]), &WriteSets::new())?;

    s.handle_trigger("a");
    let aborted = s.abort_run();

    assert_eq!(aborted, vec!["a".to_string(), "b".to_string()]);
    assert!(s.is_idle());
    assert!(s.abort_run().is_empty());
    Ok(())
}

#[test]
fn dependency_outside_the_run_counts_once_it_has_succeeded() -> TestResult {
    let mut s = scheduler_for(&sequence(["sass", "reload"]), &WriteSets::new())?;

    s.handle_trigger("sass");
    s.handle_completion("sass", TaskOutcome::Success);
    s.handle_completion("reload", TaskOutcome::Success);
    assert!(s.is_idle());

    let ready = s.handle_trigger("reload");
    assert_eq!(names(&ready), vec!["reload"]);
    assert_eq!(s.run_state_of("sass"), Some(TaskRunState::NotInRun));
    Ok(())
}

#[test]
fn stray_completions_are_ignored() -> TestResult {
    let mut s = scheduler_for(&sequence(["a", "b"]), &WriteSets::new())?;

    assert!(s.handle_completion("a", TaskOutcome::Success).is_empty());

    s.handle_trigger("a");
    assert!(s.handle_completion("b", TaskOutcome::Success).is_empty());
    assert_eq!(s.run_state_of("b"), Some(TaskRunState::Pending));
    Ok(())
}
