// src/config/validate.rs

//! File-level checks on a freshly parsed config.
//!
//! Reference checks (unknown tasks, cycles, group and rule lookups) need the
//! task registry and live in `Project::new`.

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile, StepConfig};
use crate::config::vars::VarExpander;
use crate::errors::{Result, TaskweaveError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskweaveError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        interpolate_vars(&mut raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_watch_rules(cfg)?;
    validate_groups(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() && cfg.action.is_empty() {
        return Err(TaskweaveError::ConfigError(
            "config must contain at least one [task.<name>] or [action.<name>] section"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(TaskweaveError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(ref default_task) = cfg.config.default_task {
        if default_task.trim().is_empty() {
            return Err(TaskweaveError::ConfigError(
                "[config].default_task must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Actions and tasks share one namespace.
fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.action.keys().chain(cfg.task.keys()) {
        if name.trim().is_empty() {
            return Err(TaskweaveError::ConfigError(
                "task and action names must not be empty".to_string(),
            ));
        }
    }
    for name in cfg.task.keys() {
        if cfg.action.contains_key(name) {
            return Err(TaskweaveError::DuplicateTask(name.clone()));
        }
    }
    for (name, task) in cfg.task.iter() {
        if task.steps.is_empty() {
            return Err(TaskweaveError::ConfigError(format!(
                "task '{name}' has no steps"
            )));
        }
    }
    Ok(())
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for rule in cfg.watch.iter() {
        if rule.name.trim().is_empty() {
            return Err(TaskweaveError::ConfigError(
                "[[watch]] entries need a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(rule.name.as_str()) {
            return Err(TaskweaveError::ConfigError(format!(
                "watch rule '{}' is declared more than once",
                rule.name
            )));
        }
        if rule.files.is_empty() {
            return Err(TaskweaveError::ConfigError(format!(
                "watch rule '{}' has no `files` patterns",
                rule.name
            )));
        }
        if rule.tasks.is_empty() {
            return Err(TaskweaveError::ConfigError(format!(
                "watch rule '{}' has no `tasks`",
                rule.name
            )));
        }
    }
    Ok(())
}

fn validate_groups(cfg: &RawConfigFile) -> Result<()> {
    for (name, group) in cfg.group.iter() {
        if group.members.is_empty() {
            return Err(TaskweaveError::ConfigError(format!(
                "group '{name}' has no members"
            )));
        }
        let mut seen = HashSet::new();
        for member in group.members.iter() {
            if !seen.insert(member.task()) {
                return Err(TaskweaveError::ConfigError(format!(
                    "group '{name}' lists member '{}' more than once",
                    member.task()
                )));
            }
        }
    }
    Ok(())
}

/// Substitute `${var}` references in action options and watch patterns.
fn interpolate_vars(cfg: &mut RawConfigFile) -> Result<()> {
    let vars = cfg.vars.clone();
    let expander = VarExpander::new(&vars);

    for (name, action) in cfg.action.iter_mut() {
        action
            .try_map_strings(|s| expander.expand(s))
            .map_err(|e| TaskweaveError::ConfigError(format!("action '{name}': {e}")))?;
    }

    for (name, task) in cfg.task.iter_mut() {
        for step in task.steps.iter_mut() {
            if let StepConfig::Action(action) = step {
                action
                    .try_map_strings(|s| expander.expand(s))
                    .map_err(|e| TaskweaveError::ConfigError(format!("task '{name}': {e}")))?;
            }
        }
    }

    for rule in cfg.watch.iter_mut() {
        for pattern in rule.files.iter_mut().chain(rule.exclude.iter_mut()) {
            *pattern = expander.expand(pattern).map_err(|e| {
                TaskweaveError::ConfigError(format!("watch rule '{}': {e}", rule.name))
            })?;
        }
    }

    Ok(())
}
