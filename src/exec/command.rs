// src/exec/command.rs

use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::exec::collaborator::{StepContext, StepOutcome};
use crate::exec::process::{ManagedProcess, ProcessSpec};

/// Run a one-shot tool (`command` / `shell` actions) and report how it
/// ended.
///
/// A non-zero exit is an outcome, not an error; `Err` is reserved for
/// failing to start or wait for the process. On cancellation the process
/// group is terminated and `Cancelled` is returned.
pub async fn run_to_completion(spec: &ProcessSpec, ctx: &StepContext) -> Result<StepOutcome> {
    if ctx.cancel.is_cancelled() {
        return Ok(StepOutcome::cancelled());
    }

    info!(task = %ctx.label, cmd = %spec, "starting task process");
    let mut child = ManagedProcess::spawn(spec, &ctx.label, Arc::clone(&ctx.sink))?;

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            info!(
                task = %ctx.label,
                exit_code = ?status.code(),
                success = status.success(),
                "task process exited"
            );
            let outcome = if status.success() {
                StepOutcome::success()
            } else {
                StepOutcome::failed(status.code())
            };
            Ok(outcome.with_tail(child.tail()))
        }

        _ = ctx.cancel.cancelled() => {
            info!(task = %ctx.label, "cancellation requested; terminating task process");
            child.terminate(ctx.shutdown_grace).await;
            Ok(StepOutcome::cancelled().with_tail(child.tail()))
        }
    }
}
