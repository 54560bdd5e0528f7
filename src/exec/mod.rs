// src/exec/mod.rs

//! Collaborators: how primitive actions actually run.
//!
//! - [`collaborator`] defines the [`Collaborator`] trait the engine calls and
//!   the production [`ToolCollaborator`].
//! - [`command`] runs one-shot `command` / `shell` actions.
//! - [`process`] owns child processes (process groups, SIGTERM/SIGKILL) and
//!   long-lived `process` actions with `restart_on`.
//! - [`builtin`] implements `clean`, `copy` and `concat` on a `FileSystem`.

pub mod builtin;
pub mod collaborator;
pub mod command;
pub mod process;

pub use collaborator::{
    BoxFuture, Collaborator, StepContext, StepOutcome, StepStatus, ToolCollaborator,
};
pub use process::{ManagedProcess, ProcessSpec};
