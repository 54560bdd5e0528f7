// src/dag/resolver.rs

//! Expand task names into flat execution plans.

use tracing::trace;

use crate::dag::plan::{ExecutionPlan, PlanStep};
use crate::dag::registry::{Step, Task, TaskRegistry};
use crate::errors::{Result, TaskweaveError};
use crate::types::TaskName;

/// Depth-first expander over a [`TaskRegistry`].
///
/// Pure: holds only a shared reference to the registry and keeps no state
/// between calls.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a TaskRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a single task name into its execution plan.
    pub fn resolve(&self, name: &str) -> Result<ExecutionPlan> {
        self.resolve_sequence(&[name])
    }

    /// Resolve several task names as one plan, in the given order.
    pub fn resolve_sequence<S: AsRef<str>>(&self, names: &[S]) -> Result<ExecutionPlan> {
        let mut steps = Vec::new();
        let mut stack: Vec<TaskName> = Vec::new();

        for name in names {
            self.expand_reference(name.as_ref(), None, &mut stack, &mut steps)?;
        }

        let roots = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(ExecutionPlan::new(roots, steps))
    }

    /// Expand a step reference: a registered task, or a bare prefix standing
    /// for all of its `prefix:<target>` tasks.
    fn expand_reference(
        &self,
        name: &str,
        referenced_by: Option<&str>,
        stack: &mut Vec<TaskName>,
        out: &mut Vec<PlanStep>,
    ) -> Result<()> {
        if let Some(task) = self.registry.get(name) {
            return self.expand_task(task, stack, out);
        }

        let targets = self.registry.targets_of(name);
        if targets.is_empty() {
            return Err(TaskweaveError::UnknownTask {
                name: name.to_string(),
                referenced_by: referenced_by.map(str::to_string),
            });
        }

        trace!(prefix = %name, targets = targets.len(), "expanding all targets");
        for task in targets {
            self.expand_task(task, stack, out)?;
        }
        Ok(())
    }

    fn expand_task(
        &self,
        task: &Task,
        stack: &mut Vec<TaskName>,
        out: &mut Vec<PlanStep>,
    ) -> Result<()> {
        if let Some(pos) = stack.iter().position(|n| n == &task.name) {
            let mut cycle: Vec<TaskName> = stack[pos..].to_vec();
            cycle.push(task.name.clone());
            return Err(TaskweaveError::CyclicTask { cycle });
        }

        stack.push(task.name.clone());

        for step in &task.steps {
            match step {
                Step::Action(action) => {
                    out.push(PlanStep {
                        index: out.len(),
                        task: task.name.clone(),
                        action: action.clone(),
                    });
                }
                Step::Task(sub) => {
                    self.expand_reference(sub, Some(&task.name), stack, out)?;
                }
            }
        }

        stack.pop();
        Ok(())
    }
}
