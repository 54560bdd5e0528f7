use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskweave::action::Action;
use taskweave::errors::Result;
use taskweave::exec::{BoxFuture, Collaborator, StepContext, StepOutcome};
use taskweave::types::OutputStream;

/// What the fake does when it is asked to run an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    /// Exit with the given non-zero code.
    Fail(i32),
    /// Sleep, then succeed (or report cancellation if cancelled first).
    SleepThenSucceed(Duration),
    /// Sleep, then fail with the given code.
    SleepThenFail(Duration, i32),
    /// Keep running until cancelled.
    RunUntilCancelled,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Output label (declaring task).
    pub label: String,
    /// See [`FakeCollaborator::key_of`].
    pub key: String,
}

/// A fake collaborator that:
/// - records every invocation in order
/// - behaves as scripted per action key (default: succeed, except `process`
///   actions which run until cancelled)
/// - records which invocations ended through cancellation.
#[derive(Debug, Clone, Default)]
pub struct FakeCollaborator {
    behaviours: Arc<Mutex<HashMap<String, Behaviour>>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl FakeCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour for actions with `key`.
    pub fn on(self, key: &str, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(key.to_string(), behaviour);
        self
    }

    /// Key used to script and record an action: the `cmd` of a shell
    /// action, the program of a command/process action, otherwise the kind.
    pub fn key_of(action: &Action) -> String {
        match action {
            Action::Shell(opts) => opts.cmd.clone(),
            Action::Command(opts) => opts.program.clone(),
            Action::Process(opts) => opts.program.clone(),
            other => other.kind_name().to_string(),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Keys of every invocation, in call order.
    pub fn keys(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.key).collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.invocations().iter().filter(|i| i.key == key).count()
    }

    /// Keys of invocations that ended by cancellation.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn behaviour_for(&self, action: &Action, key: &str) -> Behaviour {
        if let Some(b) = self.behaviours.lock().unwrap().get(key) {
            return *b;
        }
        if matches!(action, Action::Process(_)) {
            Behaviour::RunUntilCancelled
        } else {
            Behaviour::Succeed
        }
    }
}

impl Collaborator for FakeCollaborator {
    fn invoke<'a>(
        &'a self,
        action: &'a Action,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            let key = Self::key_of(action);
            self.invocations.lock().unwrap().push(Invocation {
                label: ctx.label.clone(),
                key: key.clone(),
            });
            ctx.sink.line(&ctx.label, OutputStream::Stdout, &format!("running {key}"));

            let outcome = match self.behaviour_for(action, &key) {
                Behaviour::Succeed => StepOutcome::success(),
                Behaviour::Fail(code) => StepOutcome::failed(Some(code)),
                Behaviour::SleepThenSucceed(d) => sleep_or_cancel(ctx, d, StepOutcome::success()).await,
                Behaviour::SleepThenFail(d, code) => {
                    sleep_or_cancel(ctx, d, StepOutcome::failed(Some(code))).await
                }
                Behaviour::RunUntilCancelled => {
                    ctx.cancel.cancelled().await;
                    StepOutcome::cancelled()
                }
            };

            if outcome.is_cancelled() {
                self.cancelled.lock().unwrap().push(key);
            }
            Ok(outcome)
        })
    }
}

async fn sleep_or_cancel(ctx: &StepContext, d: Duration, done: StepOutcome) -> StepOutcome {
    tokio::select! {
        _ = tokio::time::sleep(d) => done,
        _ = ctx.cancel.cancelled() => StepOutcome::cancelled(),
    }
}
