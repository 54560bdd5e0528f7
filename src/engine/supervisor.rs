// src/engine/supervisor.rs

//! Concurrent process supervisor.
//!
//! Runs every member of a [`ProcessGroup`] as its own tokio task, each with
//! its own cancellation token under the group's token. Every line a member
//! prints is labelled with the member's name:
//!
//! ```text
//! parent cancel ── group token ──┬── member "nodemon:dev"
//!                                ├── member "watch:scripts"
//!                                └── member "watch:less"
//! ```
//!
//! A failing one-shot member cancels the group and is reported as
//! `ProcessSupervisor`. Long-lived members that exit are logged and only
//! stop the group when `abort_on_long_lived_exit` is set.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::runner::{Engine, RunReport};
use crate::errors::{Result, TaskweaveError};
use crate::project::ProcessGroup;
use crate::types::{MemberMode, TaskName};

/// Extra time on top of the shutdown grace period before members that are
/// still running get aborted.
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(2);

struct MemberExit {
    task: TaskName,
    mode: MemberMode,
    result: Result<RunReport>,
}

/// Run `group` until the parent is cancelled, a member aborts the group, or
/// every member has exited.
pub async fn run_concurrent(
    engine: &Engine,
    group: &ProcessGroup,
    cancel: &CancellationToken,
) -> Result<()> {
    let project = engine.project();

    // Resolve everything up front so a bad member never leaves siblings
    // running.
    let mut members = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let mode = project.member_mode(member)?;
        let plan = project.resolve(&member.task)?;
        members.push((member.task.clone(), mode, plan));
    }

    let group_token = cancel.child_token();
    let mut set: JoinSet<MemberExit> = JoinSet::new();
    let mut names: HashMap<Id, TaskName> = HashMap::new();

    for (task, mode, plan) in members {
        let engine = engine.clone();
        let token = group_token.child_token();
        let name = task.clone();
        let handle = set.spawn(async move {
            let result = engine.run_labelled(&plan, &task, &token).await;
            MemberExit { task, mode, result }
        });
        names.insert(handle.id(), name);
    }

    info!(group = %group.name, members = names.len(), "process group started");

    let mut failure: Option<TaskweaveError> = None;
    loop {
        tokio::select! {
            joined = set.join_next_with_id() => {
                let exit = match joined {
                    None => {
                        info!(group = %group.name, "all group members exited");
                        break;
                    }
                    Some(Ok((_, exit))) => exit,
                    Some(Err(join_err)) => {
                        let member = names
                            .get(&join_err.id())
                            .cloned()
                            .unwrap_or_else(|| "<unknown>".to_string());
                        error!(group = %group.name, member = %member, error = %join_err, "group member panicked");
                        failure = Some(TaskweaveError::ProcessSupervisor {
                            group: group.name.clone(),
                            member,
                            source: Box::new(TaskweaveError::Other(anyhow::anyhow!("{join_err}"))),
                        });
                        break;
                    }
                };

                if let Some(err) = handle_exit(group, exit) {
                    failure = Some(err);
                    break;
                }
            }

            _ = cancel.cancelled() => {
                info!(group = %group.name, "shutdown requested; stopping group");
                break;
            }
        }
    }

    shutdown(group, &group_token, &mut set, engine.project().settings().shutdown_grace).await;

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Decide what a member exit means for the group. Returns the error that
/// aborts the group, if any.
fn handle_exit(group: &ProcessGroup, exit: MemberExit) -> Option<TaskweaveError> {
    let MemberExit { task, mode, result } = exit;
    let abort = |source: TaskweaveError| TaskweaveError::ProcessSupervisor {
        group: group.name.clone(),
        member: task.clone(),
        source: Box::new(source),
    };

    match (mode, result) {
        (_, Ok(report)) if report.interrupted.is_some() => {
            debug!(group = %group.name, member = %task, "member stopped by cancellation");
            None
        }
        (MemberMode::OneShot, Ok(report)) => {
            info!(
                group = %group.name,
                member = %task,
                elapsed = ?report.elapsed,
                "one-shot member finished"
            );
            None
        }
        (MemberMode::OneShot, Err(err)) => {
            error!(group = %group.name, member = %task, error = %err, "one-shot member failed; aborting group");
            Some(abort(err))
        }
        (MemberMode::LongLived, result) => {
            let reason = match &result {
                Ok(_) => "exited".to_string(),
                Err(err) => format!("failed: {err}"),
            };
            warn!(group = %group.name, member = %task, "long-lived member {reason}");
            if !group.abort_on_long_lived_exit {
                return None;
            }
            let source = match result {
                Ok(_) => TaskweaveError::Other(anyhow::anyhow!("long-lived member exited")),
                Err(err) => err,
            };
            Some(abort(source))
        }
    }
}

async fn shutdown(
    group: &ProcessGroup,
    group_token: &CancellationToken,
    set: &mut JoinSet<MemberExit>,
    grace: Duration,
) {
    group_token.cancel();
    if set.is_empty() {
        return;
    }

    let drained = tokio::time::timeout(grace + SHUTDOWN_MARGIN, async {
        while let Some(joined) = set.join_next().await {
            if let Ok(exit) = joined {
                debug!(group = %group.name, member = %exit.task, "member stopped");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            group = %group.name,
            remaining = set.len(),
            "members did not stop within the grace period; aborting"
        );
        set.abort_all();
        while set.join_next().await.is_some() {}
    }
    info!(group = %group.name, "process group stopped");
}
