// src/lib.rs

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod output;
pub mod project;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{CliArgs, CliCommand};
use crate::config::{config_root_dir, load_and_validate};
use crate::engine::Engine;
use crate::errors::{Result, TaskweaveError};
use crate::exec::ToolCollaborator;
use crate::output::ConsoleSink;
use crate::project::Project;
use crate::types::TaskName;

/// High-level entry point used by `main.rs`.
///
/// Loads and checks the config, then either lists it or resolves the
/// requested tasks into one plan and runs it until it finishes, fails, or
/// Ctrl-C stops it.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let root = config_root_dir(&args.config);
    let project = Arc::new(Project::from_config(&cfg, root)?);

    match args.command {
        CliCommand::List => {
            print_listing(&project);
            Ok(())
        }
        CliCommand::Run { tasks, dry_run } => {
            let tasks = requested_tasks(&project, tasks)?;
            let plan = project.resolver().resolve_sequence(tasks.as_slice())?;

            if dry_run {
                print!("{plan}");
                return Ok(());
            }

            let cancel = CancellationToken::new();
            spawn_ctrl_c_handler(cancel.clone());

            let engine = Engine::new(
                Arc::clone(&project),
                Arc::new(ToolCollaborator::default()),
                Arc::new(ConsoleSink::new()),
            );
            let report = engine.run(&plan, &cancel).await?;

            match report.interrupted {
                None => Ok(()),
                Some(index) => {
                    let long_lived = plan
                        .steps()
                        .get(index)
                        .is_some_and(|s| s.action.is_long_lived());
                    if long_lived {
                        info!(plan = %report.label, "session stopped");
                        Ok(())
                    } else {
                        Err(TaskweaveError::Interrupted { step_index: index })
                    }
                }
            }
        }
    }
}

/// Tasks named on the command line, or the configured default.
fn requested_tasks(project: &Project, tasks: Vec<TaskName>) -> Result<Vec<TaskName>> {
    if !tasks.is_empty() {
        return Ok(tasks);
    }
    match &project.settings().default_task {
        Some(default) => Ok(vec![default.clone()]),
        None => Err(TaskweaveError::ConfigError(
            "no task given and [config].default_task is not set".to_string(),
        )),
    }
}

/// First Ctrl-C cancels the run gracefully; a second one exits at once.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received; shutting down (press again to force)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second Ctrl+C; exiting immediately");
            std::process::exit(130);
        }
    });
}

fn print_listing(project: &Project) {
    let registry = project.registry();
    println!("tasks ({}):", registry.len());
    for task in registry.tasks() {
        match &task.description {
            Some(desc) => println!("  {:<24} {desc}", task.name),
            None => println!("  {}", task.name),
        }
    }

    if !project.watch_rules().is_empty() {
        println!();
        println!("watch rules:");
        for rule in project.watch_rules() {
            println!(
                "  {:<24} {:?} -> {}",
                rule.name(),
                rule.files(),
                rule.tasks().join(", ")
            );
        }
    }

    if !project.groups().is_empty() {
        println!();
        println!("process groups:");
        for group in project.groups().values() {
            let members: Vec<String> = group
                .members
                .iter()
                .map(|m| match project.member_mode(m) {
                    Ok(mode) => format!("{} ({mode})", m.task),
                    Err(_) => m.task.clone(),
                })
                .collect();
            println!("  {:<24} {}", group.name, members.join(", "));
        }
    }
}
