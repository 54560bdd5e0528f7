// tests/engine.rs

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use taskweave::engine::Engine;
use taskweave::errors::TaskweaveError;
use taskweave::output::CaptureSink;
use taskweave::project::Project;
use taskweave_test_utils::builders::{shell, step, task_ref, ProjectBuilder};
use taskweave_test_utils::{init_tracing, with_timeout, Behaviour, FakeCollaborator};

fn engine(project: Project, fake: &FakeCollaborator) -> (Engine, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::new());
    let engine = Engine::new(Arc::new(project), Arc::new(fake.clone()), sink.clone());
    (engine, sink)
}

#[tokio::test]
async fn test_steps_run_in_plan_order() {
    init_tracing();

    let project = ProjectBuilder::new()
        .action("clean:dev", shell("clean"))
        .action("browserify:app", shell("browserify"))
        .task(
            "build:dev",
            vec![task_ref("clean:dev"), task_ref("browserify:app"), step(shell("copy"))],
        )
        .build()
        .unwrap();
    let fake = FakeCollaborator::new();
    let (engine, sink) = engine(project, &fake);

    let report = with_timeout(engine.run_task("build:dev", &CancellationToken::new()))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.steps_completed, 3);
    assert_eq!(fake.keys(), vec!["clean", "browserify", "copy"]);

    // Output is labelled with the task that declared each action.
    let labels: Vec<String> = fake.invocations().into_iter().map(|i| i.label).collect();
    assert_eq!(labels, vec!["clean:dev", "browserify:app", "build:dev"]);
    assert_eq!(sink.lines_for("build:dev"), vec!["running copy"]);
}

#[tokio::test]
async fn test_failure_halts_plan_without_rollback() {
    init_tracing();

    let project = ProjectBuilder::new()
        .task(
            "three",
            vec![step(shell("first")), step(shell("second")), step(shell("third"))],
        )
        .build()
        .unwrap();
    let fake = FakeCollaborator::new().on("second", Behaviour::Fail(2));
    let (engine, _sink) = engine(project, &fake);

    let err = with_timeout(engine.run_task("three", &CancellationToken::new()))
        .await
        .unwrap_err();

    match &err {
        TaskweaveError::StepFailure {
            step_index,
            task,
            action,
            cause,
        } => {
            assert_eq!(*step_index, 1);
            assert_eq!(task, "three");
            assert_eq!(action, "shell");
            assert!(cause.contains("code 2"), "cause: {cause}");
        }
        e => panic!("Expected StepFailure, got: {:?}", e),
    }
    assert_eq!(err.exit_code(), 6);

    // Step 1 ran, step 2 was attempted, step 3 never started.
    assert_eq!(fake.keys(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_cancellation_interrupts_current_step() {
    init_tracing();

    let project = ProjectBuilder::new()
        .task(
            "slow",
            vec![step(shell("quick")), step(shell("slow")), step(shell("never"))],
        )
        .build()
        .unwrap();
    let fake = FakeCollaborator::new().on("slow", Behaviour::SleepThenSucceed(Duration::from_secs(30)));
    let (engine, _sink) = engine(project, &fake);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = with_timeout(engine.run_task("slow", &cancel)).await.unwrap();
    assert_eq!(report.interrupted, Some(1));
    assert_eq!(report.steps_completed, 1);
    assert!(!report.is_complete());
    assert_eq!(fake.keys(), vec!["quick", "slow"]);
    assert_eq!(fake.cancelled(), vec!["slow"]);
}

#[tokio::test]
async fn test_already_cancelled_runs_nothing() {
    let project = ProjectBuilder::new()
        .action("a", shell("a"))
        .build()
        .unwrap();
    let fake = FakeCollaborator::new();
    let (engine, _sink) = engine(project, &fake);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = engine.run_task("a", &cancel).await.unwrap();
    assert_eq!(report.interrupted, Some(0));
    assert!(fake.keys().is_empty());
}

#[tokio::test]
async fn test_unknown_task_fails_before_running() {
    let project = ProjectBuilder::new().action("a", shell("a")).build().unwrap();
    let fake = FakeCollaborator::new();
    let (engine, _sink) = engine(project, &fake);

    let err = engine
        .run_task("b", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskweaveError::UnknownTask { .. }));
    assert!(fake.keys().is_empty());
}
