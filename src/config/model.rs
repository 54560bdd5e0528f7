// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::action::{one_or_many, Action};
use crate::types::{MemberMode, TaskName};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// default_task = "build:dev"
/// debounce_ms = 100
///
/// [vars]
/// name = "myapp"
///
/// [action."concat"]
/// kind = "concat"
/// src = ["build/vendor.js", "build/app.js"]
/// dest = "build/${name}.js"
///
/// [task."build:dev"]
/// steps = ["clean:dev", "browserify:app", "concat", "copy:dev"]
///
/// [[watch]]
/// name = "less"
/// files = ["client/styles/**/*.less"]
/// tasks = ["less:transpile", "copy:dev"]
///
/// [group.dev]
/// members = ["nodemon:dev", "watch:scripts"]
/// ```
///
/// Every section is optional, but at least one action or task must exist.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Values substituted for `${name}` in string options.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Named primitive actions, in declaration order; each one is also a
    /// runnable task.
    #[serde(default)]
    pub action: IndexMap<TaskName, Action>,

    /// Composite tasks, in declaration order. They are registered after
    /// every action.
    #[serde(default)]
    pub task: IndexMap<TaskName, TaskConfig>,

    /// Watch rules, in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchRuleConfig>,

    /// Process groups for the supervisor.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see
/// `config::validate`), so holding one means the raw checks passed and all
/// `${var}` references have been substituted.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub vars: BTreeMap<String, String>,
    pub action: IndexMap<TaskName, Action>,
    pub task: IndexMap<TaskName, TaskConfig>,
    pub watch: Vec<WatchRuleConfig>,
    pub group: BTreeMap<String, GroupConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            vars: raw.vars,
            action: raw.action,
            task: raw.task,
            watch: raw.watch,
            group: raw.group,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Task used by `taskweave run` when no task is named.
    #[serde(default)]
    pub default_task: Option<TaskName>,

    /// Trailing-edge debounce window for watch events, per path.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a process gets between SIGTERM and SIGKILL on shutdown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Maximum number of watch-triggered runs waiting behind the current one.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_queue_length() -> usize {
    16
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: None,
            debounce_ms: default_debounce_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            queue_length: default_queue_length(),
        }
    }
}

impl ConfigSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepConfig>,
}

/// A step entry: a task name, or an inline action table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Task(TaskName),
    Action(Action),
}

/// One `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchRuleConfig {
    pub name: String,

    /// Globs relative to the project root.
    #[serde(deserialize_with = "one_or_many")]
    pub files: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Tasks to run, in order, when a matching file changes.
    #[serde(alias = "task", deserialize_with = "one_or_many")]
    pub tasks: Vec<TaskName>,

    /// Only trigger when the changed file's content actually differs.
    #[serde(default)]
    pub use_hash: bool,
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub members: Vec<GroupMemberConfig>,

    /// Abort the whole group when a long-lived member exits.
    #[serde(default)]
    pub abort_on_long_lived_exit: bool,
}

/// A group member: a bare task name, or `{ task = "...", mode = "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GroupMemberConfig {
    Name(TaskName),
    Detailed(GroupMemberDetail),
}

/// Table form of a group member. Unknown keys are rejected so a misspelt
/// `mode` is not silently replaced by the inferred one.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupMemberDetail {
    pub task: TaskName,
    #[serde(default)]
    pub mode: Option<MemberMode>,
}

impl GroupMemberConfig {
    pub fn task(&self) -> &str {
        match self {
            GroupMemberConfig::Name(name) => name,
            GroupMemberConfig::Detailed(detail) => &detail.task,
        }
    }

    pub fn mode(&self) -> Option<MemberMode> {
        match self {
            GroupMemberConfig::Name(_) => None,
            GroupMemberConfig::Detailed(detail) => detail.mode,
        }
    }
}
