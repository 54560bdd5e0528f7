// tests/registry.rs

use std::collections::BTreeMap;

use taskweave::dag::{Step, Task, TaskGraph, TaskRegistry};
use taskweave::errors::TaskweaveError;
use taskweave_test_utils::builders::{command, shell, step, task_ref};

#[test]
fn test_register_and_lookup() {
    let mut registry = TaskRegistry::new();
    registry
        .register("lint", vec![step(command("eslint", &["client/src"]))])
        .unwrap();

    let task = registry.lookup("lint").unwrap();
    assert_eq!(task.name, "lint");
    assert_eq!(task.steps.len(), 1);
    assert!(registry.contains("lint"));
}

#[test]
fn test_duplicate_registration_fails() {
    let mut registry = TaskRegistry::new();
    registry.register("build", vec![step(shell("a"))]).unwrap();

    let err = registry
        .register("build", vec![step(shell("b"))])
        .unwrap_err();
    match err {
        TaskweaveError::DuplicateTask(name) => assert_eq!(name, "build"),
        e => panic!("Expected DuplicateTask, got: {:?}", e),
    }
    // The original registration is untouched.
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.lookup("build").unwrap().steps,
        vec![step(shell("a"))]
    );
}

#[test]
fn test_lookup_unknown_task() {
    let registry = TaskRegistry::new();
    match registry.lookup("deploy") {
        Err(TaskweaveError::UnknownTask { name, referenced_by }) => {
            assert_eq!(name, "deploy");
            assert_eq!(referenced_by, None);
        }
        other => panic!("Expected UnknownTask, got: {:?}", other),
    }
}

#[test]
fn test_invalid_action_rejected_at_registration() {
    let mut registry = TaskRegistry::new();
    let err = registry
        .register("broken", vec![step(command("  ", &[]))])
        .unwrap_err();
    match err {
        TaskweaveError::InvalidAction { task, reason } => {
            assert_eq!(task, "broken");
            assert!(reason.contains("program"), "reason: {reason}");
        }
        e => panic!("Expected InvalidAction, got: {:?}", e),
    }
    assert!(!registry.contains("broken"));
}

#[test]
fn test_registration_order_and_targets() {
    let mut registry = TaskRegistry::new();
    for name in ["clean:build", "less", "clean:dev", "clean:prod", "cleanup"] {
        registry.register(name, vec![step(shell(name))]).unwrap();
    }

    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        vec!["clean:build", "less", "clean:dev", "clean:prod", "cleanup"]
    );

    let targets: Vec<&str> = registry
        .targets_of("clean")
        .into_iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(targets, vec!["clean:build", "clean:dev", "clean:prod"]);

    assert!(registry.is_resolvable("clean"));
    assert!(!registry.is_resolvable("clea"));
}

#[test]
fn test_task_refs_and_description() {
    let task = Task::new(
        "build:dev",
        vec![task_ref("clean:dev"), step(shell("echo")), Step::task("copy:dev")],
    )
    .with_description("Build for development");

    let refs: Vec<&str> = task.task_refs().collect();
    assert_eq!(refs, vec!["clean:dev", "copy:dev"]);
    assert_eq!(task.actions().count(), 1);
    assert_eq!(task.description.as_deref(), Some("Build for development"));
}

#[test]
fn test_graph_dependencies_expand_bare_prefix() {
    let mut registry = TaskRegistry::new();
    registry.register("clean:dev", vec![step(shell("rm dev"))]).unwrap();
    registry.register("clean:prod", vec![step(shell("rm prod"))]).unwrap();
    registry.register("concat", vec![step(shell("cat"))]).unwrap();
    registry
        .register("init", vec![task_ref("clean"), task_ref("concat"), step(shell("echo"))])
        .unwrap();

    let groups = BTreeMap::new();
    let graph = TaskGraph::build(&registry, &groups);

    let mut deps = graph.dependencies_of("init");
    deps.sort();
    assert_eq!(deps, vec!["clean:dev", "clean:prod", "concat"]);
    assert!(graph.dependencies_of("concat").is_empty());

    // Lookups may use short-lived names, including unknown ones.
    let looked_up = String::from("init");
    assert_eq!(graph.dependencies_of(&looked_up).len(), 3);
    assert!(graph.dependencies_of(&format!("{looked_up}:missing")).is_empty());
    graph.check_acyclic().unwrap();
}
