// src/exec/collaborator.rs

//! Collaborator abstraction.
//!
//! The engine hands each primitive [`Action`] to a [`Collaborator`] and only
//! looks at the returned [`StepOutcome`]. Production code uses
//! [`ToolCollaborator`], which spawns external tools and runs the builtin
//! file actions; tests substitute a fake that records invocations.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::errors::{Result, TaskweaveError};
use crate::exec::process::ProcessSpec;
use crate::exec::{builtin, command, process};
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::OutputSink;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a collaborator needs besides the action itself.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Output label, normally the task that declared the action.
    pub label: String,
    /// Project root; relative paths in actions are resolved against it.
    pub root: PathBuf,
    pub cancel: CancellationToken,
    pub sink: Arc<dyn OutputSink>,
    /// SIGTERM -> SIGKILL bound when a process is stopped.
    pub shutdown_grace: Duration,
    /// Debounce window for `restart_on` file changes.
    pub debounce: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    /// `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: StepStatus,
    /// Last lines of output, kept for failure reports.
    pub output_tail: Vec<String>,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            output_tail: Vec::new(),
        }
    }

    pub fn failed(code: Option<i32>) -> Self {
        Self {
            status: StepStatus::Failed { code },
            output_tail: Vec::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: StepStatus::Cancelled,
            output_tail: Vec::new(),
        }
    }

    pub fn with_tail(mut self, tail: Vec<String>) -> Self {
        self.output_tail = tail;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == StepStatus::Cancelled
    }

    /// Human-readable failure cause: the exit code plus the output tail.
    pub fn describe_failure(&self) -> String {
        let mut cause = match self.status {
            StepStatus::Success => "succeeded".to_string(),
            StepStatus::Cancelled => "cancelled".to_string(),
            StepStatus::Failed { code: Some(code) } => format!("exited with code {code}"),
            StepStatus::Failed { code: None } => "terminated by signal".to_string(),
        };
        if !self.output_tail.is_empty() {
            cause.push_str("; last output:\n");
            cause.push_str(&self.output_tail.join("\n"));
        }
        cause
    }
}

/// Runs primitive actions.
///
/// Implementations must return `StepStatus::Cancelled` promptly once
/// `ctx.cancel` fires, after stopping whatever they started.
pub trait Collaborator: Send + Sync {
    fn invoke<'a>(
        &'a self,
        action: &'a Action,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome>>;
}

/// Production collaborator: external tools via `tokio::process`, builtin
/// file actions via a [`FileSystem`].
///
/// `watch` and `concurrent` steps never reach a collaborator; the engine
/// runs them itself.
#[derive(Debug, Clone)]
pub struct ToolCollaborator {
    fs: Arc<dyn FileSystem>,
}

impl Default for ToolCollaborator {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl ToolCollaborator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl Collaborator for ToolCollaborator {
    fn invoke<'a>(
        &'a self,
        action: &'a Action,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            match action {
                Action::Command(opts) => {
                    command::run_to_completion(&ProcessSpec::command(opts, &ctx.root), ctx).await
                }
                Action::Shell(opts) => {
                    command::run_to_completion(&ProcessSpec::shell(opts, &ctx.root), ctx).await
                }
                Action::Process(opts) => process::run_long_lived(opts, ctx).await,
                Action::Clean(_) | Action::Copy(_) | Action::Concat(_) => {
                    if ctx.cancel.is_cancelled() {
                        return Ok(StepOutcome::cancelled());
                    }
                    let fs = Arc::clone(&self.fs);
                    let root = ctx.root.clone();
                    let action = action.clone();
                    let sink = Arc::clone(&ctx.sink);
                    let label = ctx.label.clone();
                    let done = tokio::task::spawn_blocking(move || {
                        builtin::run_builtin(fs.as_ref(), &root, &action, sink.as_ref(), &label)
                    })
                    .await
                    .map_err(|e| TaskweaveError::Other(anyhow::anyhow!("builtin action panicked: {e}")))?;
                    done?;
                    Ok(StepOutcome::success())
                }
                Action::Watch(_) | Action::Concurrent(_) => Err(TaskweaveError::Other(
                    anyhow::anyhow!("'{}' steps are run by the engine", action.kind_name()),
                )),
            }
        })
    }
}
