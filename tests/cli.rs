// tests/cli.rs

use std::path::PathBuf;

use clap::Parser;
use taskweave::cli::{CliArgs, CliCommand};
use taskweave::config::default_config_path;

#[test]
fn test_config_defaults_to_project_file() {
    let args = CliArgs::try_parse_from(["taskweave", "list"]).unwrap();
    assert_eq!(args.config, default_config_path());
    assert!(matches!(args.command, CliCommand::List));
}

#[test]
fn test_run_with_tasks_and_global_flags() {
    let args = CliArgs::try_parse_from([
        "taskweave",
        "run",
        "build:dev",
        "server",
        "--dry-run",
        "--config",
        "web/Taskweave.toml",
    ])
    .unwrap();

    assert_eq!(args.config, PathBuf::from("web/Taskweave.toml"));
    match args.command {
        CliCommand::Run { tasks, dry_run } => {
            assert_eq!(tasks, vec!["build:dev", "server"]);
            assert!(dry_run);
        }
        other => panic!("Expected run, got: {other:?}"),
    }
}
