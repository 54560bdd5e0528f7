// src/dag/plan.rs

use std::fmt;

use crate::action::Action;
use crate::types::TaskName;

/// One primitive step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Position of this step in the plan (0-based).
    pub index: usize,
    /// Task that declared the action; used for output labels and failure
    /// reports.
    pub task: TaskName,
    pub action: Action,
}

/// Flattened, ordered list of primitive actions derived from one or more
/// tasks.
///
/// Plans are computed on demand by the resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    roots: Vec<TaskName>,
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub(crate) fn new(roots: Vec<TaskName>, steps: Vec<PlanStep>) -> Self {
        Self { roots, steps }
    }

    /// The task name(s) this plan was resolved from.
    pub fn roots(&self) -> &[TaskName] {
        &self.roots
    }

    /// Label for the whole plan, e.g. `build:dev` or `clean:dev+concat`.
    pub fn label(&self) -> String {
        self.roots.join("+")
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether any step keeps running until cancelled (process, watch,
    /// concurrent group).
    pub fn is_long_lived(&self) -> bool {
        self.steps.iter().any(|s| s.action.is_long_lived())
    }

    /// Names of the declaring tasks, one per step, in plan order.
    pub fn step_tasks(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.task.as_str()).collect()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plan for {} ({} steps):", self.label(), self.steps.len())?;
        for step in &self.steps {
            writeln!(f, "  {:>3}. [{}] {}", step.index, step.task, step.action)?;
        }
        Ok(())
    }
}
