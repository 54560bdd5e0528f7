// src/engine/runner.rs

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::action::Action;
use crate::dag::{ExecutionPlan, PlanStep};
use crate::engine::supervisor;
use crate::errors::{Result, TaskweaveError};
use crate::exec::{BoxFuture, Collaborator, StepContext, StepOutcome, StepStatus};
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::OutputSink;
use crate::project::Project;
use crate::watch::session::WatchSession;

/// How a plan run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub label: String,
    pub steps_total: usize,
    pub steps_completed: usize,
    /// Index of the step that was running (or about to run) when the run
    /// was cancelled.
    pub interrupted: Option<usize>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none() && self.steps_completed == self.steps_total
    }
}

/// Runs execution plans step by step.
///
/// Cheap to clone: every field is shared. The supervisor clones the engine
/// into each group member's task, and watch sessions clone it for every
/// triggered run.
#[derive(Clone)]
pub struct Engine {
    project: Arc<Project>,
    collaborator: Arc<dyn Collaborator>,
    sink: Arc<dyn OutputSink>,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.project.root())
            .field("tasks", &self.project.registry().len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        project: Arc<Project>,
        collaborator: Arc<dyn Collaborator>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            project,
            collaborator,
            sink,
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Filesystem used for content hashing in watch sessions.
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolve `name` and run it.
    pub async fn run_task(&self, name: &str, cancel: &CancellationToken) -> Result<RunReport> {
        let plan = self.project.resolve(name)?;
        self.run(&plan, cancel).await
    }

    /// Run every step of `plan` in order.
    ///
    /// The first failing step ends the run with `StepFailure`; steps that
    /// already ran are not undone. A failing member of a `concurrent` step
    /// surfaces as `ProcessSupervisor`. Cancellation is not an error: the
    /// report records the step that was interrupted.
    pub fn run<'a>(
        &'a self,
        plan: &'a ExecutionPlan,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RunReport>> {
        self.run_plan(plan, None, cancel)
    }

    /// Like [`Engine::run`], but every line of output is labelled `label`
    /// instead of the task that declared the step. Group members use this so
    /// two members sharing a sub-task stay distinguishable.
    pub fn run_labelled<'a>(
        &'a self,
        plan: &'a ExecutionPlan,
        label: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RunReport>> {
        self.run_plan(plan, Some(label), cancel)
    }

    fn run_plan<'a>(
        &'a self,
        plan: &'a ExecutionPlan,
        label_override: Option<&'a str>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RunReport>> {
        Box::pin(async move {
            let started = Instant::now();
            let label = plan.label();
            let mut report = RunReport {
                label: label.clone(),
                steps_total: plan.len(),
                steps_completed: 0,
                interrupted: None,
                elapsed: Duration::ZERO,
            };

            info!(plan = %label, steps = plan.len(), "running plan");

            for step in plan.steps() {
                if cancel.is_cancelled() {
                    report.interrupted = Some(step.index);
                    break;
                }

                debug!(
                    task = %step.task,
                    step = step.index,
                    action = %step.action,
                    "running step"
                );

                let outcome = self.run_step(step, label_override, cancel).await?;
                match outcome.status {
                    StepStatus::Success => report.steps_completed += 1,
                    StepStatus::Cancelled => {
                        info!(task = %step.task, step = step.index, "step interrupted");
                        report.interrupted = Some(step.index);
                        break;
                    }
                    StepStatus::Failed { .. } => {
                        let cause = outcome.describe_failure();
                        error!(
                            task = %step.task,
                            step = step.index,
                            action = step.action.kind_name(),
                            "step failed; halting plan"
                        );
                        return Err(TaskweaveError::StepFailure {
                            step_index: step.index,
                            task: step.task.clone(),
                            action: step.action.kind_name().to_string(),
                            cause,
                        });
                    }
                }
            }

            report.elapsed = started.elapsed();
            if report.is_complete() {
                info!(plan = %label, elapsed = ?report.elapsed, "plan finished");
            }
            Ok(report)
        })
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        label_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome> {
        match &step.action {
            Action::Concurrent(opts) => {
                let group = self.project.group(&opts.group)?;
                supervisor::run_concurrent(self, group, cancel).await?;
                Ok(finished_or_cancelled(cancel))
            }
            Action::Watch(opts) => {
                let rules = self.project.rules_named(&opts.rules)?;
                WatchSession::new(self.clone(), rules).run(cancel).await?;
                Ok(finished_or_cancelled(cancel))
            }
            action => {
                let label = label_override.unwrap_or(step.task.as_str());
                let ctx = self.step_context(label, cancel);
                match self.collaborator.invoke(action, &ctx).await {
                    Ok(outcome) => Ok(outcome),
                    Err(err) => Err(TaskweaveError::StepFailure {
                        step_index: step.index,
                        task: step.task.clone(),
                        action: action.kind_name().to_string(),
                        cause: format!("{err:#}"),
                    }),
                }
            }
        }
    }

    fn step_context(&self, label: &str, cancel: &CancellationToken) -> StepContext {
        let settings = self.project.settings();
        StepContext {
            label: label.to_string(),
            root: self.project.root().to_path_buf(),
            cancel: cancel.clone(),
            sink: Arc::clone(&self.sink),
            shutdown_grace: settings.shutdown_grace,
            debounce: settings.debounce,
        }
    }
}

fn finished_or_cancelled(cancel: &CancellationToken) -> StepOutcome {
    if cancel.is_cancelled() {
        StepOutcome::cancelled()
    } else {
        StepOutcome::success()
    }
}
