#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use taskweave::action::{Action, CommandOptions, ConcurrentOptions, ProcessOptions, ShellOptions, WatchOptions};
use taskweave::dag::{Step, TaskRegistry};
use taskweave::errors::Result;
use taskweave::project::{GroupMember, ProcessGroup, Project, Settings};
use taskweave::types::MemberMode;
use taskweave::watch::WatchRule;

/// Builder for `Project` to simplify test setup without a TOML file.
///
/// Registration errors are kept and returned from [`ProjectBuilder::build`],
/// so tests can assert on `DuplicateTask` / `InvalidAction` too.
pub struct ProjectBuilder {
    registry: TaskRegistry,
    rules: Vec<WatchRule>,
    groups: BTreeMap<String, ProcessGroup>,
    settings: Settings,
    root: PathBuf,
    error: Option<taskweave::errors::TaskweaveError>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            rules: Vec::new(),
            groups: BTreeMap::new(),
            settings: Settings {
                debounce: Duration::from_millis(20),
                shutdown_grace: Duration::from_millis(500),
                ..Settings::default()
            },
            root: PathBuf::from("/proj"),
            error: None,
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.settings.debounce = window;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.settings.shutdown_grace = grace;
        self
    }

    pub fn queue_length(mut self, len: usize) -> Self {
        self.settings.queue_length = len;
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.settings.default_task = Some(name.to_string());
        self
    }

    /// Register a task with the given steps.
    pub fn task(mut self, name: &str, steps: Vec<Step>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.register(name, steps) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Register a single-action task.
    pub fn action(self, name: &str, action: Action) -> Self {
        self.task(name, vec![Step::Action(action)])
    }

    pub fn rule(mut self, name: &str, files: &[&str], tasks: &[&str]) -> Self {
        self.push_rule(name, files, tasks, false);
        self
    }

    pub fn hash_rule(mut self, name: &str, files: &[&str], tasks: &[&str]) -> Self {
        self.push_rule(name, files, tasks, true);
        self
    }

    fn push_rule(&mut self, name: &str, files: &[&str], tasks: &[&str], use_hash: bool) {
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        let tasks = tasks.iter().map(|s| s.to_string()).collect();
        let rule = WatchRule::new(name, &files, &[], tasks, use_hash).expect("valid watch rule");
        self.rules.push(rule);
    }

    pub fn group(mut self, name: &str, members: Vec<GroupMember>) -> Self {
        self.groups
            .insert(name.to_string(), ProcessGroup::new(name, members));
        self
    }

    pub fn aborting_group(mut self, name: &str, members: Vec<GroupMember>) -> Self {
        let mut group = ProcessGroup::new(name, members);
        group.abort_on_long_lived_exit = true;
        self.groups.insert(name.to_string(), group);
        self
    }

    pub fn build(self) -> Result<Project> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Project::new(self.registry, self.rules, self.groups, self.settings, self.root)
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `shell` action; the fake collaborator keys behaviour on `cmd`.
pub fn shell(cmd: &str) -> Action {
    Action::Shell(ShellOptions {
        cmd: cmd.to_string(),
        cwd: None,
        env: BTreeMap::new(),
    })
}

pub fn command(program: &str, args: &[&str]) -> Action {
    Action::Command(CommandOptions {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cwd: None,
        env: BTreeMap::new(),
    })
}

/// Long-lived `process` action.
pub fn process(program: &str, args: &[&str]) -> Action {
    Action::Process(ProcessOptions {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cwd: None,
        env: BTreeMap::new(),
        restart_on: Vec::new(),
    })
}

pub fn concurrent(group: &str) -> Action {
    Action::Concurrent(ConcurrentOptions {
        group: group.to_string(),
    })
}

pub fn watch(rules: &[&str]) -> Action {
    Action::Watch(WatchOptions {
        rules: rules.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn step(action: Action) -> Step {
    Step::Action(action)
}

pub fn task_ref(name: &str) -> Step {
    Step::task(name)
}

pub fn member(task: &str) -> GroupMember {
    GroupMember::new(task)
}

pub fn one_shot(task: &str) -> GroupMember {
    GroupMember::new(task).with_mode(MemberMode::OneShot)
}

pub fn long_lived(task: &str) -> GroupMember {
    GroupMember::new(task).with_mode(MemberMode::LongLived)
}
