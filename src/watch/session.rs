// src/watch/session.rs

//! Async shell around [`WatchTrigger`].
//!
//! Feeds relative changed paths into the trigger, wakes up at the next
//! debounce deadline, and runs queued rule plans one at a time on the
//! engine. A run in progress is never preempted: changes that arrive while
//! it runs are debounced and queued behind it.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::runner::{Engine, RunReport};
use crate::errors::Result;
use crate::watch::rules::WatchRule;
use crate::watch::trigger::{TriggeredRun, WatchTrigger};
use crate::watch::watcher::spawn_watcher;

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub runs: usize,
    pub failures: usize,
}

struct ActiveRun {
    run: TriggeredRun,
    handle: JoinHandle<Result<RunReport>>,
}

#[derive(Debug)]
pub struct WatchSession {
    engine: Engine,
    trigger: WatchTrigger,
}

impl WatchSession {
    pub fn new(engine: Engine, rules: Vec<WatchRule>) -> Self {
        let project = engine.project();
        let settings = project.settings();
        let trigger = WatchTrigger::new(
            rules,
            settings.debounce,
            settings.queue_length,
            std::sync::Arc::clone(engine.fs()),
            project.root(),
        );
        Self { engine, trigger }
    }

    /// Watch the project root until `cancel` fires.
    pub async fn run(self, cancel: &CancellationToken) -> Result<SessionReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _watcher = spawn_watcher(self.engine.project().root(), tx)?;
        let names: Vec<&str> = self.trigger.rules().iter().map(|r| r.name()).collect();
        info!(rules = ?names, "waiting for file changes");
        self.run_events(rx, cancel).await
    }

    /// Drive the session from an explicit stream of relative paths.
    ///
    /// Ends when `cancel` fires, or when `events` is closed and every queued
    /// run has finished.
    pub async fn run_events(
        mut self,
        mut events: mpsc::UnboundedReceiver<String>,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        self.trigger.prime_hashes();

        let runs_token = cancel.child_token();
        let mut report = SessionReport::default();
        let mut active: Option<ActiveRun> = None;
        let mut events_open = true;

        loop {
            if active.is_none() {
                if let Some(next) = self.trigger.next_run() {
                    active = Some(self.start(next, &runs_token));
                }
            }

            if !events_open && active.is_none() && self.trigger.is_idle() {
                debug!("event stream closed and nothing pending; ending session");
                break;
            }

            let deadline = self.trigger.next_deadline();

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopping watch session");
                    break;
                }

                event = events.recv(), if events_open => match event {
                    Some(path) => {
                        self.trigger.record_change(&path, now());
                    }
                    None => {
                        debug!("file event stream closed");
                        events_open = false;
                    }
                },

                _ = sleep_until(deadline) => {
                    for run in self.trigger.fire_due(now()) {
                        info!(rule = %run.rule, path = %run.path, "file changed");
                    }
                }

                joined = join_active(&mut active) => {
                    let finished = active.take();
                    let rule = finished.map(|a| a.run.rule).unwrap_or_default();
                    report.runs += 1;
                    match joined {
                        Ok(Ok(run)) if run.interrupted.is_some() => {
                            debug!(rule = %rule, "watch run interrupted");
                        }
                        Ok(Ok(run)) => {
                            info!(rule = %rule, elapsed = ?run.elapsed, "watch run finished; waiting");
                        }
                        Ok(Err(err)) => {
                            report.failures += 1;
                            error!(rule = %rule, error = %err, "watch run failed; still watching");
                        }
                        Err(join_err) => {
                            report.failures += 1;
                            error!(rule = %rule, error = %join_err, "watch run panicked; still watching");
                        }
                    }
                }
            }
        }

        runs_token.cancel();
        if let Some(active) = active.take() {
            if let Err(e) = active.handle.await {
                warn!(rule = %active.run.rule, error = %e, "watch run did not stop cleanly");
            }
        }

        Ok(report)
    }

    fn start(&self, run: TriggeredRun, token: &CancellationToken) -> ActiveRun {
        info!(rule = %run.rule, tasks = ?run.tasks, "running watch tasks");
        let engine = self.engine.clone();
        let token = token.clone();
        let tasks = run.tasks.clone();
        let handle = tokio::spawn(async move {
            let plan = engine.project().resolver().resolve_sequence(tasks.as_slice())?;
            engine.run(&plan, &token).await
        });
        ActiveRun { run, handle }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

async fn join_active(
    active: &mut Option<ActiveRun>,
) -> std::result::Result<Result<RunReport>, tokio::task::JoinError> {
    match active {
        Some(run) => (&mut run.handle).await,
        None => std::future::pending().await,
    }
}
