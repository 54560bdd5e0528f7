// src/project.rs

//! The loaded, checked project: registry, watch rules, process groups and
//! settings.
//!
//! A [`Project`] is built once from a validated [`ConfigFile`] and is then
//! shared read-only (behind an `Arc`) by the engine, the supervisor and every
//! watch session. There is no process-wide instance.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::action::Action;
use crate::config::model::{ConfigFile, ConfigSection, StepConfig};
use crate::dag::{ExecutionPlan, Resolver, Step, Task, TaskGraph, TaskRegistry};
use crate::errors::{Result, TaskweaveError};
use crate::types::{GroupName, MemberMode, TaskName};
use crate::watch::rules::WatchRule;

/// Runtime settings from the `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub default_task: Option<TaskName>,
    pub debounce: Duration,
    pub shutdown_grace: Duration,
    pub queue_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from(&ConfigSection::default())
    }
}

impl From<&ConfigSection> for Settings {
    fn from(section: &ConfigSection) -> Self {
        Self {
            default_task: section.default_task.clone(),
            debounce: section.debounce(),
            shutdown_grace: section.shutdown_grace(),
            queue_length: section.queue_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub task: TaskName,
    /// Explicit mode; `None` means inferred from the member's plan.
    pub mode: Option<MemberMode>,
}

impl GroupMember {
    pub fn new(task: impl Into<TaskName>) -> Self {
        Self {
            task: task.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: MemberMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// A named set of tasks the supervisor runs side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup {
    pub name: GroupName,
    pub members: Vec<GroupMember>,
    pub abort_on_long_lived_exit: bool,
}

impl ProcessGroup {
    pub fn new(name: impl Into<GroupName>, members: Vec<GroupMember>) -> Self {
        Self {
            name: name.into(),
            members,
            abort_on_long_lived_exit: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    registry: TaskRegistry,
    watch_rules: Vec<WatchRule>,
    groups: BTreeMap<GroupName, ProcessGroup>,
    settings: Settings,
    root: PathBuf,
}

impl Project {
    /// Register every action and task from `cfg`, compile the watch rules,
    /// and run the whole-project checks of [`Project::new`].
    ///
    /// Each `[action.<name>]` becomes a task `<name>` with that action as its
    /// only step.
    pub fn from_config(cfg: &ConfigFile, root: impl Into<PathBuf>) -> Result<Self> {
        let mut registry = TaskRegistry::new();

        for (name, action) in &cfg.action {
            registry.register(name.clone(), vec![Step::Action(action.clone())])?;
        }

        for (name, task_cfg) in &cfg.task {
            let steps = task_cfg
                .steps
                .iter()
                .map(|step| match step {
                    StepConfig::Task(name) => Step::Task(name.clone()),
                    StepConfig::Action(action) => Step::Action(action.clone()),
                })
                .collect();
            let mut task = Task::new(name.clone(), steps);
            task.description = task_cfg.description.clone();
            registry.register_task(task)?;
        }

        let mut watch_rules = Vec::with_capacity(cfg.watch.len());
        for rule_cfg in &cfg.watch {
            let rule = WatchRule::from_config(rule_cfg).map_err(|e| {
                TaskweaveError::ConfigError(format!("watch rule '{}': {e:#}", rule_cfg.name))
            })?;
            watch_rules.push(rule);
        }

        let groups = cfg
            .group
            .iter()
            .map(|(name, group_cfg)| {
                let members = group_cfg
                    .members
                    .iter()
                    .map(|m| GroupMember {
                        task: m.task().to_string(),
                        mode: m.mode(),
                    })
                    .collect();
                let group = ProcessGroup {
                    name: name.clone(),
                    members,
                    abort_on_long_lived_exit: group_cfg.abort_on_long_lived_exit,
                };
                (name.clone(), group)
            })
            .collect();

        Self::new(
            registry,
            watch_rules,
            groups,
            Settings::from(&cfg.config),
            root,
        )
    }

    /// Assemble a project and check that every reference resolves and that
    /// the task graph is acyclic.
    pub fn new(
        registry: TaskRegistry,
        watch_rules: Vec<WatchRule>,
        groups: BTreeMap<GroupName, ProcessGroup>,
        settings: Settings,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let project = Self {
            registry,
            watch_rules,
            groups,
            settings,
            root: root.into(),
        };
        project.check()?;
        debug!(
            tasks = project.registry.len(),
            rules = project.watch_rules.len(),
            groups = project.groups.len(),
            "project loaded"
        );
        Ok(project)
    }

    fn check(&self) -> Result<()> {
        for task in self.registry.tasks() {
            for name in task.task_refs() {
                self.require_resolvable(name, &task.name)?;
            }
            for action in task.actions() {
                match action {
                    Action::Concurrent(opts) if !self.groups.contains_key(&opts.group) => {
                        return Err(TaskweaveError::ConfigError(format!(
                            "task '{}' runs unknown process group '{}'",
                            task.name, opts.group
                        )));
                    }
                    Action::Watch(opts) => {
                        for rule in &opts.rules {
                            if self.rule(rule).is_none() {
                                return Err(TaskweaveError::ConfigError(format!(
                                    "task '{}' watches unknown rule '{rule}'",
                                    task.name
                                )));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        for group in self.groups.values() {
            if group.members.is_empty() {
                return Err(TaskweaveError::ConfigError(format!(
                    "process group '{}' has no members",
                    group.name
                )));
            }
            for member in &group.members {
                self.require_resolvable(&member.task, &format!("group({})", group.name))?;
            }
        }

        for rule in &self.watch_rules {
            for name in rule.tasks() {
                self.require_resolvable(name, &format!("watch({})", rule.name()))?;
            }
        }

        if let Some(default) = &self.settings.default_task {
            if !self.registry.is_resolvable(default) {
                return Err(TaskweaveError::UnknownTask {
                    name: default.clone(),
                    referenced_by: Some("config.default_task".to_string()),
                });
            }
        }

        TaskGraph::build(&self.registry, &self.groups).check_acyclic()?;

        // Rule plans run one after another inside a session; a step that
        // never finishes would block the session for good.
        for rule in &self.watch_rules {
            let plan = self.resolver().resolve_sequence(rule.tasks())?;
            if let Some(step) = plan.steps().iter().find(|s| s.action.is_long_lived()) {
                return Err(TaskweaveError::ConfigError(format!(
                    "watch rule '{}' would run long-lived step '{}' of task '{}'",
                    rule.name(),
                    step.action.kind_name(),
                    step.task
                )));
            }
        }

        Ok(())
    }

    fn require_resolvable(&self, name: &str, referenced_by: &str) -> Result<()> {
        if self.registry.is_resolvable(name) {
            Ok(())
        } else {
            Err(TaskweaveError::UnknownTask {
                name: name.to_string(),
                referenced_by: Some(referenced_by.to_string()),
            })
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.registry)
    }

    pub fn resolve(&self, name: &str) -> Result<ExecutionPlan> {
        self.resolver().resolve(name)
    }

    pub fn watch_rules(&self) -> &[WatchRule] {
        &self.watch_rules
    }

    pub fn rule(&self, name: &str) -> Option<&WatchRule> {
        self.watch_rules.iter().find(|r| r.name() == name)
    }

    /// Rules selected by a `watch` step, in declaration order.
    ///
    /// An empty selection means every rule.
    pub fn rules_named(&self, names: &[String]) -> Result<Vec<WatchRule>> {
        if names.is_empty() {
            return Ok(self.watch_rules.clone());
        }
        for name in names {
            if self.rule(name).is_none() {
                return Err(TaskweaveError::ConfigError(format!(
                    "unknown watch rule '{name}'"
                )));
            }
        }
        Ok(self
            .watch_rules
            .iter()
            .filter(|r| names.iter().any(|n| n == r.name()))
            .cloned()
            .collect())
    }

    pub fn groups(&self) -> &BTreeMap<GroupName, ProcessGroup> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Result<&ProcessGroup> {
        self.groups.get(name).ok_or_else(|| {
            TaskweaveError::ConfigError(format!("unknown process group '{name}'"))
        })
    }

    /// Mode of a group member: the configured one, or long-lived when its
    /// plan contains a long-lived step.
    pub fn member_mode(&self, member: &GroupMember) -> Result<MemberMode> {
        if let Some(mode) = member.mode {
            return Ok(mode);
        }
        let plan = self.resolve(&member.task)?;
        Ok(if plan.is_long_lived() {
            MemberMode::LongLived
        } else {
            MemberMode::OneShot
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Directory every relative path in actions and rules is resolved
    /// against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
