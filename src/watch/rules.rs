// src/watch/rules.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::WatchRuleConfig;
use crate::fs::FileSystem;
use crate::types::TaskName;

/// Compiled `[[watch]]` rule: file patterns plus the tasks to run.
///
/// The patterns are relative to the project root; the watcher passes
/// relative paths (e.g. `"client/src/main.js"`) into [`WatchRule::matches`].
#[derive(Clone)]
pub struct WatchRule {
    name: String,
    files: Vec<String>,
    file_set: GlobSet,
    exclude_set: Option<GlobSet>,
    tasks: Vec<TaskName>,
    use_hash: bool,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("name", &self.name)
            .field("files", &self.files)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    pub fn new(
        name: impl Into<String>,
        files: &[String],
        exclude: &[String],
        tasks: Vec<TaskName>,
        use_hash: bool,
    ) -> Result<Self> {
        let name = name.into();
        let file_set = build_globset(files)
            .with_context(|| format!("building files globset for watch rule {name}"))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for watch rule {name}"))?,
            )
        };

        Ok(Self {
            name,
            files: files.to_vec(),
            file_set,
            exclude_set,
            tasks,
            use_hash,
        })
    }

    pub fn from_config(cfg: &WatchRuleConfig) -> Result<Self> {
        Self::new(
            cfg.name.clone(),
            &cfg.files,
            &cfg.exclude,
            cfg.tasks.clone(),
            cfg.use_hash,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Patterns as written in the config.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Tasks run, in order, when this rule fires.
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Returns true if the given path (relative to the project root) is
    /// watched by this rule and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.file_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every file under `root` whose relative path matches `set`.
///
/// Results are sorted so callers get a stable order.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    set: &GlobSet,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if set.is_match(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
