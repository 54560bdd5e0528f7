// src/errors.rs

//! Crate-wide error type and exit-code mapping.

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum TaskweaveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown task: '{name}'{}", referenced_by_suffix(.referenced_by))]
    UnknownTask {
        name: TaskName,
        referenced_by: Option<TaskName>,
    },

    #[error("Duplicate task: '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("Cycle detected in task graph: {}", .cycle.join(" -> "))]
    CyclicTask { cycle: Vec<TaskName> },

    #[error("Invalid action options in task '{task}': {reason}")]
    InvalidAction { task: TaskName, reason: String },

    #[error("Step {step_index} ({action}) of task '{task}' failed: {cause}")]
    StepFailure {
        step_index: usize,
        task: TaskName,
        action: String,
        cause: String,
    },

    #[error("Process group '{group}' aborted: member '{member}' failed: {source}")]
    ProcessSupervisor {
        group: String,
        member: TaskName,
        #[source]
        source: Box<TaskweaveError>,
    },

    #[error("Interrupted at step {step_index} before the plan completed")]
    Interrupted { step_index: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn referenced_by_suffix(referenced_by: &Option<TaskName>) -> String {
    match referenced_by {
        Some(parent) => format!(" (referenced by '{parent}')"),
        None => String::new(),
    }
}

impl TaskweaveError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskweaveError::ConfigError(_)
            | TaskweaveError::InvalidAction { .. }
            | TaskweaveError::TomlError(_) => 2,
            TaskweaveError::UnknownTask { .. } => 3,
            TaskweaveError::DuplicateTask(_) => 4,
            TaskweaveError::CyclicTask { .. } => 5,
            TaskweaveError::StepFailure { .. } => 6,
            TaskweaveError::ProcessSupervisor { .. } => 7,
            TaskweaveError::Interrupted { .. } => 130,
            TaskweaveError::IoError(_) | TaskweaveError::Other(_) => 1,
        }
    }

    /// Whether this error is raised while loading configuration, i.e. before
    /// any step has run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TaskweaveError::ConfigError(_)
                | TaskweaveError::InvalidAction { .. }
                | TaskweaveError::TomlError(_)
                | TaskweaveError::UnknownTask { .. }
                | TaskweaveError::DuplicateTask(_)
                | TaskweaveError::CyclicTask { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskweaveError>;
