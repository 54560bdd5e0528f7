// tests/resolver.rs

use proptest::prelude::*;
use taskweave::dag::{Resolver, Step, TaskRegistry};
use taskweave::errors::TaskweaveError;
use taskweave_test_utils::builders::{shell, step, task_ref};

fn registry(tasks: &[(&str, Vec<Step>)]) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for (name, steps) in tasks {
        registry.register(*name, steps.clone()).unwrap();
    }
    registry
}

fn keys(plan: &taskweave::dag::ExecutionPlan) -> Vec<String> {
    plan.steps()
        .iter()
        .map(|s| match &s.action {
            taskweave::action::Action::Shell(opts) => opts.cmd.clone(),
            other => other.kind_name().to_string(),
        })
        .collect()
}

#[test]
fn test_depth_first_declared_order() {
    let registry = registry(&[
        ("clean:dev", vec![step(shell("rm build"))]),
        ("browserify:app", vec![step(shell("browserify"))]),
        ("concat", vec![step(shell("concat"))]),
        (
            "build:dev",
            vec![
                task_ref("clean:dev"),
                task_ref("browserify:app"),
                step(shell("inline")),
                task_ref("concat"),
            ],
        ),
        ("server", vec![task_ref("build:dev"), step(shell("nodemon"))]),
    ]);

    let plan = Resolver::new(&registry).resolve("server").unwrap();
    assert_eq!(
        keys(&plan),
        vec!["rm build", "browserify", "inline", "concat", "nodemon"]
    );
    assert_eq!(
        plan.step_tasks(),
        vec!["clean:dev", "browserify:app", "build:dev", "concat", "server"]
    );
    let indices: Vec<usize> = plan.steps().iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(plan.roots(), ["server".to_string()]);
}

#[test]
fn test_duplicates_are_kept() {
    let registry = registry(&[
        ("copy:dev", vec![step(shell("cp"))]),
        ("twice", vec![task_ref("copy:dev"), task_ref("copy:dev")]),
    ]);
    let plan = Resolver::new(&registry).resolve("twice").unwrap();
    assert_eq!(keys(&plan), vec!["cp", "cp"]);
}

#[test]
fn test_two_task_cycle_is_reported() {
    let registry = registry(&[
        ("A", vec![task_ref("B")]),
        ("B", vec![step(shell("b")), task_ref("A")]),
    ]);

    match Resolver::new(&registry).resolve("A") {
        Err(TaskweaveError::CyclicTask { cycle }) => {
            assert_eq!(cycle, vec!["A", "B", "A"]);
        }
        other => panic!("Expected CyclicTask, got: {:?}", other),
    }
}

#[test]
fn test_self_reference_is_a_cycle() {
    let registry = registry(&[("loop", vec![task_ref("loop")])]);
    match Resolver::new(&registry).resolve("loop") {
        Err(TaskweaveError::CyclicTask { cycle }) => assert_eq!(cycle, vec!["loop", "loop"]),
        other => panic!("Expected CyclicTask, got: {:?}", other),
    }
}

#[test]
fn test_unknown_reference_names_parent() {
    let registry = registry(&[("build", vec![task_ref("missing")])]);
    match Resolver::new(&registry).resolve("build") {
        Err(TaskweaveError::UnknownTask { name, referenced_by }) => {
            assert_eq!(name, "missing");
            assert_eq!(referenced_by.as_deref(), Some("build"));
        }
        other => panic!("Expected UnknownTask, got: {:?}", other),
    }
}

#[test]
fn test_bare_prefix_expands_all_targets() {
    let registry = registry(&[
        ("clean:build", vec![step(shell("rm build"))]),
        ("clean:dev", vec![step(shell("rm dev"))]),
        ("clean:prod", vec![step(shell("rm prod"))]),
        ("init", vec![task_ref("clean")]),
    ]);
    let plan = Resolver::new(&registry).resolve("init").unwrap();
    assert_eq!(keys(&plan), vec!["rm build", "rm dev", "rm prod"]);
}

#[test]
fn test_resolve_sequence_concatenates() {
    let registry = registry(&[
        ("a", vec![step(shell("a"))]),
        ("b", vec![step(shell("b1")), step(shell("b2"))]),
    ]);
    let plan = Resolver::new(&registry).resolve_sequence(&["b", "a"]).unwrap();
    assert_eq!(keys(&plan), vec!["b1", "b2", "a"]);
    assert_eq!(plan.label(), "b+a");
    assert!(!plan.is_long_lived());
}

// Acyclic registries: task i may only reference tasks < i. Each task owns
// `own[i]` actions followed by its references.
fn acyclic_strategy(max_tasks: usize) -> impl Strategy<Value = (Vec<usize>, Vec<Vec<usize>>)> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(0..3usize, n),
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n),
        )
            .prop_map(move |(own, raw_refs)| {
                let refs = raw_refs
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| {
                        if i == 0 {
                            Vec::new()
                        } else {
                            r.into_iter().map(|x| x % i).collect()
                        }
                    })
                    .collect();
                (own, refs)
            })
    })
}

fn expected_len(i: usize, own: &[usize], refs: &[Vec<usize>]) -> usize {
    own[i] + refs[i].iter().map(|&r| expected_len(r, own, refs)).sum::<usize>()
}

proptest! {
    #[test]
    fn test_plan_length_is_sum_of_reachable_actions(input in acyclic_strategy(8)) {
        let (own, refs) = input;
        let mut registry = TaskRegistry::new();
        for i in 0..own.len() {
            let mut steps: Vec<Step> = (0..own[i])
                .map(|k| step(shell(&format!("t{i}-{k}"))))
                .collect();
            steps.extend(refs[i].iter().map(|r| task_ref(&format!("t{r}"))));
            registry.register(format!("t{i}"), steps).unwrap();
        }

        let last = own.len() - 1;
        let plan = Resolver::new(&registry).resolve(&format!("t{last}")).unwrap();
        prop_assert_eq!(plan.len(), expected_len(last, &own, &refs));

        // Own actions come first, in declared order.
        for (k, s) in plan.steps().iter().take(own[last]).enumerate() {
            prop_assert_eq!(&s.task, &format!("t{last}"));
            prop_assert_eq!(s.index, k);
        }
    }
}
