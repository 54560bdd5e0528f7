// tests/builtin.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use taskweave::action::{Action, CleanOptions, ConcatOptions, CopyFile, CopyOptions};
use taskweave::exec::{Collaborator, StepContext, StepStatus, ToolCollaborator};
use taskweave::fs::mock::MockFileSystem;
use taskweave::fs::FileSystem;
use taskweave::output::CaptureSink;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct Harness {
    fs: MockFileSystem,
    sink: Arc<CaptureSink>,
    collaborator: ToolCollaborator,
}

impl Harness {
    fn new() -> Self {
        let fs = MockFileSystem::new();
        Self {
            collaborator: ToolCollaborator::new(Arc::new(fs.clone())),
            fs,
            sink: Arc::new(CaptureSink::new()),
        }
    }

    fn ctx(&self) -> StepContext {
        StepContext {
            label: "build".to_string(),
            root: PathBuf::from("/proj"),
            cancel: CancellationToken::new(),
            sink: self.sink.clone(),
            shutdown_grace: Duration::from_millis(500),
            debounce: Duration::from_millis(20),
        }
    }

    async fn run(&self, action: Action) -> taskweave::errors::Result<StepStatus> {
        let ctx = self.ctx();
        let outcome = self.collaborator.invoke(&action, &ctx).await?;
        Ok(outcome.status)
    }
}

#[tokio::test]
async fn test_clean_removes_literal_and_glob_paths() {
    let h = Harness::new();
    h.fs.add_file("/proj/dist/app.js", "x");
    h.fs.add_file("/proj/dist/css/site.css", "y");
    h.fs.add_file("/proj/less/site.tmp", "z");
    h.fs.add_file("/proj/less/site.less", "body {}");

    let status = h
        .run(Action::Clean(CleanOptions {
            paths: strings(&["dist", "**/*.tmp", "missing"]),
        }))
        .await
        .unwrap();

    assert_eq!(status, StepStatus::Success);
    assert!(!h.fs.exists("/proj/dist".as_ref()));
    assert!(!h.fs.exists("/proj/dist/css/site.css".as_ref()));
    assert!(!h.fs.exists("/proj/less/site.tmp".as_ref()));
    assert!(h.fs.exists("/proj/less/site.less".as_ref()));

    assert_eq!(
        h.sink.lines_for("build"),
        vec![
            "Cleaning dist...",
            "Cleaning less/site.tmp...",
            "2 path(s) cleaned."
        ]
    );
}

#[tokio::test]
async fn test_copy_into_directory_keeps_file_names() {
    let h = Harness::new();
    h.fs.add_file("/proj/bower_components/jquery/jquery.js", "jq");
    h.fs.add_file("/proj/bower_components/backbone/backbone.js", "bb");

    let status = h
        .run(Action::Copy(CopyOptions {
            files: vec![CopyFile {
                src: strings(&["bower_components/*/*.js"]),
                dest: "public/vendor/".to_string(),
            }],
        }))
        .await
        .unwrap();

    assert_eq!(status, StepStatus::Success);
    assert_eq!(h.fs.contents("/proj/public/vendor/jquery.js").as_deref(), Some("jq"));
    assert_eq!(h.fs.contents("/proj/public/vendor/backbone.js").as_deref(), Some("bb"));
    assert_eq!(h.sink.lines_for("build"), vec!["Copied 2 file(s)."]);
}

#[tokio::test]
async fn test_copy_to_file_path() {
    let h = Harness::new();
    h.fs.add_file("/proj/client/index.html", "<html>");

    h.run(Action::Copy(CopyOptions {
        files: vec![CopyFile {
            src: strings(&["client/index.html"]),
            dest: "public/index.html".to_string(),
        }],
    }))
    .await
    .unwrap();

    assert_eq!(h.fs.contents("/proj/public/index.html").as_deref(), Some("<html>"));
}

#[tokio::test]
async fn test_copy_many_files_to_file_path_fails() {
    let h = Harness::new();
    h.fs.add_file("/proj/client/a.html", "a");
    h.fs.add_file("/proj/client/b.html", "b");

    let err = h
        .run(Action::Copy(CopyOptions {
            files: vec![CopyFile {
                src: strings(&["client/*.html"]),
                dest: "public/index.html".to_string(),
            }],
        }))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("end it with '/'"), "got: {err}");
    assert!(!h.fs.exists("/proj/public/index.html".as_ref()));
}

#[tokio::test]
async fn test_copy_without_match_fails() {
    let h = Harness::new();
    h.fs.add_dir("/proj");

    let err = h
        .run(Action::Copy(CopyOptions {
            files: vec![CopyFile {
                src: strings(&["client/*.html"]),
                dest: "public/".to_string(),
            }],
        }))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no files match"), "got: {err}");
}

#[tokio::test]
async fn test_concat_joins_in_pattern_order_without_duplicates() {
    let h = Harness::new();
    h.fs.add_file("/proj/client/templates/b.js", "B");
    h.fs.add_file("/proj/client/templates/a.js", "A");
    h.fs.add_file("/proj/client/main.js", "MAIN");

    let status = h
        .run(Action::Concat(ConcatOptions {
            src: strings(&["client/main.js", "client/**/*.js"]),
            dest: "build/app.js".to_string(),
            separator: ";\n".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(status, StepStatus::Success);
    assert_eq!(
        h.fs.contents("/proj/build/app.js").as_deref(),
        Some("MAIN;\nA;\nB")
    );
    assert_eq!(h.sink.lines_for("build"), vec!["File build/app.js created."]);
}

#[tokio::test]
async fn test_builtin_skipped_when_already_cancelled() {
    let h = Harness::new();
    h.fs.add_file("/proj/dist/app.js", "x");

    let ctx = h.ctx();
    ctx.cancel.cancel();
    let outcome = h
        .collaborator
        .invoke(
            &Action::Clean(CleanOptions {
                paths: strings(&["dist"]),
            }),
            &ctx,
        )
        .await
        .unwrap();

    assert!(outcome.is_cancelled());
    assert!(h.fs.exists("/proj/dist/app.js".as_ref()));
}
