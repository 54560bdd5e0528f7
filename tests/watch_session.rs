// tests/watch_session.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use taskweave::engine::Engine;
use taskweave::fs::mock::MockFileSystem;
use taskweave::output::CaptureSink;
use taskweave::project::Project;
use taskweave::watch::WatchSession;
use taskweave_test_utils::builders::{shell, step, watch, ProjectBuilder};
use taskweave_test_utils::{init_tracing, with_timeout, Behaviour, FakeCollaborator};

fn session(project: Project, fake: &FakeCollaborator) -> WatchSession {
    let project = Arc::new(project);
    let rules = project.rules_named(&[]).unwrap();
    let engine = Engine::new(project, Arc::new(fake.clone()), Arc::new(CaptureSink::new()));
    WatchSession::new(engine, rules)
}

fn scripts_project() -> ProjectBuilder {
    ProjectBuilder::new()
        .action("build", shell("build"))
        .action("jshint", shell("jshint"))
        .rule("scripts", &["client/**/*.js"], &["jshint", "build"])
}

#[tokio::test]
async fn test_burst_of_changes_runs_once() {
    init_tracing();

    let fake = FakeCollaborator::new();
    let session = session(scripts_project().build().unwrap(), &fake);

    let (tx, rx) = mpsc::unbounded_channel();
    for _ in 0..5 {
        tx.send("client/app.js".to_string()).unwrap();
    }
    tx.send("README.md".to_string()).unwrap();
    drop(tx);

    let report = with_timeout(session.run_events(rx, &CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(report.runs, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(fake.keys(), vec!["jshint", "build"]);
}

#[tokio::test]
async fn test_matching_rules_run_in_declaration_order() {
    init_tracing();

    let project = ProjectBuilder::new()
        .action("lint", shell("lint"))
        .action("build", shell("build"))
        .rule("lint", &["**/*.js"], &["lint"])
        .rule("scripts", &["client/**/*.js"], &["build"])
        .build()
        .unwrap();
    let fake = FakeCollaborator::new();
    let session = session(project, &fake);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("client/app.js".to_string()).unwrap();
    drop(tx);

    let report = with_timeout(session.run_events(rx, &CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(report.runs, 2);
    assert_eq!(fake.keys(), vec!["lint", "build"]);
}

#[tokio::test]
async fn test_failed_run_does_not_end_session() {
    init_tracing();

    let project = ProjectBuilder::new()
        .action("lint", shell("lint"))
        .action("build", shell("build"))
        .rule("lint", &["**/*.js"], &["lint"])
        .rule("scripts", &["client/**/*.js"], &["build"])
        .build()
        .unwrap();
    let fake = FakeCollaborator::new().on("lint", Behaviour::Fail(1));
    let session = session(project, &fake);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("client/app.js".to_string()).unwrap();
    drop(tx);

    let report = with_timeout(session.run_events(rx, &CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(report.runs, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(fake.keys(), vec!["lint", "build"]);
}

#[tokio::test]
async fn test_change_during_run_is_queued_behind_it() {
    init_tracing();

    let fake = FakeCollaborator::new()
        .on("jshint", Behaviour::SleepThenSucceed(Duration::from_millis(200)));
    let session = session(scripts_project().build().unwrap(), &fake);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("client/app.js".to_string()).unwrap();
    let feeder = tokio::spawn(async move {
        // Lands while the first run is still in `jshint`.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("client/other.js".to_string()).unwrap();
    });

    let report = with_timeout(session.run_events(rx, &CancellationToken::new()))
        .await
        .unwrap();
    feeder.await.unwrap();

    assert_eq!(report.runs, 2);
    // Never interleaved: each run completes before the next starts.
    assert_eq!(fake.keys(), vec!["jshint", "build", "jshint", "build"]);
    assert!(fake.cancelled().is_empty());
}

#[tokio::test]
async fn test_cancel_stops_active_run() {
    init_tracing();

    let fake = FakeCollaborator::new()
        .on("build", Behaviour::SleepThenSucceed(Duration::from_secs(30)));
    let session = session(scripts_project().build().unwrap(), &fake);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("client/app.js".to_string()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let report = with_timeout(session.run_events(rx, &cancel)).await.unwrap();
    drop(tx);

    assert_eq!(report.failures, 0);
    assert_eq!(fake.cancelled(), vec!["build"]);
}

#[tokio::test]
async fn test_hash_rule_ignores_saves_without_changes() {
    init_tracing();

    let mock = MockFileSystem::new();
    mock.add_file("/proj/less/site.less", "body {}");

    let project = Arc::new(
        ProjectBuilder::new()
            .action("less", shell("lessc"))
            .hash_rule("less", &["less/*.less"], &["less"])
            .build()
            .unwrap(),
    );
    let fake = FakeCollaborator::new();
    let engine = Engine::new(
        Arc::clone(&project),
        Arc::new(fake.clone()),
        Arc::new(CaptureSink::new()),
    )
    .with_fs(Arc::new(mock.clone()));
    let session = WatchSession::new(engine, project.rules_named(&[]).unwrap());

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("less/site.less".to_string()).unwrap();
    let feeder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        mock.add_file("/proj/less/site.less", "body { margin: 0 }");
        tx.send("less/site.less".to_string()).unwrap();
    });

    let report = with_timeout(session.run_events(rx, &CancellationToken::new()))
        .await
        .unwrap();
    feeder.await.unwrap();

    assert_eq!(report.runs, 1);
    assert_eq!(fake.keys(), vec!["lessc"]);
}

#[tokio::test]
async fn test_watch_step_reacts_to_real_file_changes() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("client")).unwrap();

    let project = ProjectBuilder::new()
        .root(dir.path())
        .action("build", shell("build"))
        .rule("scripts", &["client/*.js"], &["build"])
        .task("watch", vec![step(watch(&[]))])
        .build()
        .unwrap();
    let fake = FakeCollaborator::new();
    let engine = Engine::new(
        Arc::new(project),
        Arc::new(fake.clone()),
        Arc::new(CaptureSink::new()),
    );

    let cancel = CancellationToken::new();
    let run = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run_task("watch", &cancel).await })
    };

    // Give the watcher time to register before touching files.
    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(dir.path().join("client").join("app.js"), "let a = 1;").unwrap();

    with_timeout(async {
        while fake.count("build") == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    cancel.cancel();
    let report = with_timeout(run).await.unwrap().unwrap();

    assert_eq!(report.interrupted, Some(0));
    assert!(fake.count("build") >= 1);
}
