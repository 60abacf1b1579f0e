// tests/graph_compile.rs

mod common;
use crate::common::builders::SiteConfigBuilder;
use crate::common::TestResult;

use sitepipe::dag::{parallel, sequence, task, DagGraph, NodeSpec};
use sitepipe::errors::SitepipeError;
use sitepipe::presets::{build_graph, dev_graph, watch_bindings, watch_nodes};
use sitepipe::tasks::TaskRegistry;
use sitepipe::Plan;

fn deps_of<'a>(nodes: &'a [NodeSpec], id: &str) -> Vec<&'a str> {
    nodes
        .iter()
        .find(|n| n.id == id)
        .map(|n| n.deps.iter().map(String::as_str).collect())
        .unwrap_or_else(|| panic!("node {id} missing"))
}

fn node(id: &str, deps: &[&str]) -> NodeSpec {
    NodeSpec {
        id: id.to_string(),
        task: id.to_string(),
        deps: deps.iter().map(|d| d.to_string()).collect(),
    }
}

#[test]
fn sequence_around_parallel_group_joins_on_every_member() {
    let spec = sequence([task("a"), parallel(["b", "c"]), task("d")]);
    let nodes = spec.compile();

    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);

    assert!(deps_of(&nodes, "a").is_empty());
    assert_eq!(deps_of(&nodes, "b"), vec!["a"]);
    assert_eq!(deps_of(&nodes, "c"), vec!["a"]);
    assert_eq!(deps_of(&nodes, "d"), vec!["b", "c"]);
}

#[test]
fn nested_sequences_inside_parallel_keep_their_own_order() {
    let spec = sequence([
        task("start"),
        parallel([sequence(["x1", "x2"]), task("y")]),
        task("end"),
    ]);
    let nodes = spec.compile();

    assert_eq!(deps_of(&nodes, "x1"), vec!["start"]);
    assert_eq!(deps_of(&nodes, "x2"), vec!["x1"]);
    assert_eq!(deps_of(&nodes, "y"), vec!["start"]);
    assert_eq!(deps_of(&nodes, "end"), vec!["x2", "y"]);
}

#[test]
fn empty_parallel_group_passes_dependencies_through() {
    let spec = sequence([task("a"), parallel(Vec::<&str>::new()), task("b")]);
    let nodes = spec.compile();

    assert_eq!(nodes.len(), 2);
    assert_eq!(deps_of(&nodes, "b"), vec!["a"]);
}

#[test]
fn repeated_task_gets_suffixed_node_id() {
    let nodes = sequence(["a", "b", "a"]).compile();

    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "a#2"]);
    assert_eq!(nodes[2].task, "a");
    assert_eq!(deps_of(&nodes, "a#2"), vec!["b"]);
}

#[test]
fn prefix_is_applied_to_ids_but_not_tasks() {
    let nodes = sequence(["images", "webp"]).compile_with_prefix(Some("images"));

    assert_eq!(nodes[0].id, "images/images");
    assert_eq!(nodes[0].task, "images");
    assert_eq!(nodes[1].id, "images/webp");
    assert_eq!(deps_of(&nodes, "images/webp"), vec!["images/images"]);
}

#[test]
fn graph_rejects_cycles() {
    let err = DagGraph::from_nodes(vec![node("a", &["b"]), node("b", &["a"])]).unwrap_err();
    assert!(matches!(err, SitepipeError::DagCycle(_)), "got {err:?}");
}

#[test]
fn graph_rejects_unknown_dependencies_and_duplicates() {
    let err = DagGraph::from_nodes(vec![node("a", &["ghost"])]).unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(ref m) if m.contains("ghost")));

    let err = DagGraph::from_nodes(vec![node("a", &[]), node("a", &[])]).unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(ref m) if m.contains("duplicate")));
}

#[test]
fn graph_roots_are_nodes_without_dependencies() -> TestResult {
    let graph = DagGraph::from_nodes(sequence([parallel(["a", "b"]), task("c")]).compile())?;
    assert_eq!(graph.roots(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(graph.dependents_of("a"), &["c".to_string()]);
    Ok(())
}

#[test]
fn registry_rejects_unknown_task_names() {
    let registry = TaskRegistry::standard();
    let err = registry
        .compile(&sequence(["sass", "minify_everything"]))
        .unwrap_err();
    assert!(matches!(err, SitepipeError::UnknownTask(ref name) if name == "minify_everything"));
}

#[test]
fn build_graph_ends_with_deploy() -> TestResult {
    let registry = TaskRegistry::standard();
    let spec = build_graph();

    assert_eq!(spec.task_names().last(), Some(&"deploy"));

    let graph = registry.compile(&spec)?;
    assert_eq!(graph.roots(), vec!["env".to_string()]);

    let mut deploy_deps = graph.dependencies_of("deploy").to_vec();
    deploy_deps.sort();
    assert_eq!(deploy_deps, vec!["html".to_string(), "webp".to_string()]);
    Ok(())
}

#[test]
fn dev_graph_never_deploys() -> TestResult {
    let registry = TaskRegistry::standard();
    let spec = dev_graph();

    assert!(!spec.task_names().contains(&"deploy"));
    assert!(!spec.task_names().contains(&"html"));

    let graph = registry.compile(&spec)?;
    let mut roots = graph.roots();
    roots.sort();
    assert_eq!(roots, vec!["clean_dist".to_string(), "env".to_string()]);
    Ok(())
}

#[test]
fn every_watch_binding_ends_with_a_reload() -> TestResult {
    let cfg = SiteConfigBuilder::new().build();
    let bindings = watch_bindings(&cfg);
    let registry = TaskRegistry::standard();

    let graph = registry.compile_nodes(watch_nodes(&bindings))?;

    for binding in &bindings {
        let reload = format!("{}/reload", binding.name);
        assert!(graph.contains(&reload), "{reload} missing");
        assert!(graph.dependents_of(&reload).is_empty());
    }

    assert_eq!(
        graph.dependencies_of("images/reload"),
        &["images/webp".to_string()]
    );
    assert_eq!(
        graph.dependencies_of("images/webp"),
        &["images/images".to_string()]
    );
    Ok(())
}

#[test]
fn plan_resolution() -> TestResult {
    let registry = TaskRegistry::standard();

    assert_eq!(Plan::resolve("build", &registry)?, Plan::Once(build_graph()));
    assert_eq!(Plan::resolve("dev", &registry)?, Plan::Dev(dev_graph()));
    assert_eq!(Plan::resolve("serve", &registry)?, Plan::Serve);
    assert_eq!(Plan::resolve("deploy", &registry)?, Plan::Once(task("deploy")));
    assert_eq!(Plan::resolve("images", &registry)?, Plan::Once(task("images")));

    let err = Plan::resolve("publish", &registry).unwrap_err();
    assert!(matches!(err, SitepipeError::UnknownTask(ref n) if n == "publish"));
    Ok(())
}
