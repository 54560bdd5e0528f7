// src/dag/registry.rs

//! Named tasks and their declared steps.

use std::collections::HashMap;

use tracing::debug;

use crate::action::Action;
use crate::errors::{Result, TaskweaveError};
use crate::types::TaskName;

/// One declared step of a task: either a primitive action or a reference to
/// another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Action(Action),
    Task(TaskName),
}

impl Step {
    pub fn task(name: impl Into<TaskName>) -> Self {
        Step::Task(name.into())
    }
}

impl From<Action> for Step {
    fn from(action: Action) -> Self {
        Step::Action(action)
    }
}

/// A named, declared unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: TaskName,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Task {
    pub fn new(name: impl Into<TaskName>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Names of tasks this task references directly.
    pub fn task_refs(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Task(name) => Some(name.as_str()),
            Step::Action(_) => None,
        })
    }

    /// Primitive actions declared directly on this task.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.steps.iter().filter_map(|step| match step {
            Step::Action(action) => Some(action),
            Step::Task(_) => None,
        })
    }
}

/// Store of named tasks.
///
/// Built once at configuration load and then shared read-only by the
/// resolver, engine and supervisor. Registration order is retained so that
/// listings and target expansion are deterministic.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<TaskName, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with the given steps.
    ///
    /// Fails with `DuplicateTask` when the name is taken and with
    /// `InvalidAction` when any inline action has invalid options.
    pub fn register(&mut self, name: impl Into<TaskName>, steps: Vec<Step>) -> Result<()> {
        self.register_task(Task::new(name, steps))
    }

    /// Register a fully described task.
    pub fn register_task(&mut self, task: Task) -> Result<()> {
        if task.name.trim().is_empty() {
            return Err(TaskweaveError::ConfigError(
                "task names must not be empty".to_string(),
            ));
        }
        if self.index.contains_key(&task.name) {
            return Err(TaskweaveError::DuplicateTask(task.name));
        }

        for action in task.actions() {
            action
                .validate()
                .map_err(|reason| TaskweaveError::InvalidAction {
                    task: task.name.clone(),
                    reason,
                })?;
        }

        debug!(task = %task.name, steps = task.steps.len(), "registered task");
        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Look up a task by name.
    pub fn lookup(&self, name: &str) -> Result<&Task> {
        self.get(name).ok_or_else(|| TaskweaveError::UnknownTask {
            name: name.to_string(),
            referenced_by: None,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tasks named `<prefix>:<target>`, in registration order.
    ///
    /// A bare prefix such as `clean` stands for all of its targets
    /// (`clean:build`, `clean:dev`, ...).
    pub fn targets_of(&self, prefix: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| {
                t.name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(':') && rest.len() > 1)
            })
            .collect()
    }

    /// Whether `name` can be referenced from a step: either a task, or a
    /// prefix with at least one target.
    pub fn is_resolvable(&self, name: &str) -> bool {
        self.contains(name) || !self.targets_of(name).is_empty()
    }

    /// Task names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
