// src/action.rs

//! Primitive actions: one tagged variant per collaborator kind.
//!
//! Actions are what a task ultimately boils down to once the resolver has
//! inlined every sub-task. The crate never looks inside the tools they
//! invoke; it only knows how to start them, feed them options, and read
//! back success or failure.
//!
//! ```toml
//! [action."less:transpile"]
//! kind = "command"
//! program = "lessc"
//! args = ["client/styles/less/main.less", "build/${name}.css"]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use globset::Glob;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Run an external tool to completion (bundler, compiler, linter, ...).
    Command(CommandOptions),
    /// Run a shell command line to completion.
    Shell(ShellOptions),
    /// Delete files or directories.
    Clean(CleanOptions),
    /// Copy files.
    Copy(CopyOptions),
    /// Concatenate files into one.
    Concat(ConcatOptions),
    /// Start a long-lived process and keep it running until shutdown.
    Process(ProcessOptions),
    /// Run a file-watch session for a set of rules until shutdown.
    Watch(WatchOptions),
    /// Run a process group under the supervisor.
    Concurrent(ConcurrentOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandOptions {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory relative to the project root.
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellOptions {
    pub cmd: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanOptions {
    /// Literal paths or globs, relative to the project root.
    #[serde(deserialize_with = "one_or_many")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyOptions {
    pub files: Vec<CopyFile>,
}

/// One `src -> dest` mapping of a copy action.
///
/// A `dest` ending in `/` is a directory: every matched file keeps its file
/// name. Any other `dest` is a file path and exactly one file must match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyFile {
    #[serde(deserialize_with = "one_or_many")]
    pub src: Vec<String>,
    pub dest: String,
}

impl CopyFile {
    pub fn dest_is_dir(&self) -> bool {
        self.dest.ends_with('/') || self.dest.ends_with('\\')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcatOptions {
    #[serde(deserialize_with = "one_or_many")]
    pub src: Vec<String>,
    pub dest: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessOptions {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Globs (relative to the project root); a change to a matching file
    /// restarts the process.
    #[serde(default)]
    pub restart_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchOptions {
    /// Names of `[[watch]]` rules; empty means every rule.
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrentOptions {
    pub group: String,
}

impl Action {
    /// Short name of the collaborator kind (`"command"`, `"copy"`, ...).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Action::Command(_) => "command",
            Action::Shell(_) => "shell",
            Action::Clean(_) => "clean",
            Action::Copy(_) => "copy",
            Action::Concat(_) => "concat",
            Action::Process(_) => "process",
            Action::Watch(_) => "watch",
            Action::Concurrent(_) => "concurrent",
        }
    }

    /// Whether this action keeps running until it is cancelled.
    pub fn is_long_lived(&self) -> bool {
        matches!(
            self,
            Action::Process(_) | Action::Watch(_) | Action::Concurrent(_)
        )
    }

    /// Check the options of this action.
    ///
    /// Returns a human-readable reason on failure; the registry wraps it into
    /// `TaskweaveError::InvalidAction` with the owning task name.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Action::Command(opts) => {
                require_non_empty("program", &opts.program)?;
                validate_cwd(opts.cwd.as_deref())
            }
            Action::Shell(opts) => {
                require_non_empty("cmd", &opts.cmd)?;
                validate_cwd(opts.cwd.as_deref())
            }
            Action::Clean(opts) => {
                if opts.paths.is_empty() {
                    return Err("clean needs at least one entry in `paths`".to_string());
                }
                for path in &opts.paths {
                    require_non_empty("paths entry", path)?;
                    require_inside_root(path)?;
                    validate_glob(path)?;
                }
                Ok(())
            }
            Action::Copy(opts) => {
                if opts.files.is_empty() {
                    return Err("copy needs at least one entry in `files`".to_string());
                }
                for file in &opts.files {
                    if file.src.is_empty() {
                        return Err(format!("copy to '{}' has no `src`", file.dest));
                    }
                    require_non_empty("dest", &file.dest)?;
                    require_inside_root(&file.dest)?;
                    for src in &file.src {
                        validate_glob(src)?;
                    }
                }
                Ok(())
            }
            Action::Concat(opts) => {
                if opts.src.is_empty() {
                    return Err("concat needs at least one entry in `src`".to_string());
                }
                require_non_empty("dest", &opts.dest)?;
                require_inside_root(&opts.dest)?;
                for src in &opts.src {
                    validate_glob(src)?;
                }
                Ok(())
            }
            Action::Process(opts) => {
                require_non_empty("program", &opts.program)?;
                validate_cwd(opts.cwd.as_deref())?;
                for pattern in &opts.restart_on {
                    validate_glob(pattern)?;
                }
                Ok(())
            }
            Action::Watch(opts) => {
                for rule in &opts.rules {
                    require_non_empty("rules entry", rule)?;
                }
                Ok(())
            }
            Action::Concurrent(opts) => require_non_empty("group", &opts.group),
        }
    }

    /// Apply `f` to every user-supplied string option of this action.
    ///
    /// Used for `${var}` interpolation at load time.
    pub fn try_map_strings<F>(&mut self, mut f: F) -> Result<(), String>
    where
        F: FnMut(&str) -> Result<String, String>,
    {
        fn apply<F>(f: &mut F, s: &mut String) -> Result<(), String>
        where
            F: FnMut(&str) -> Result<String, String>,
        {
            *s = f(s)?;
            Ok(())
        }

        match self {
            Action::Command(opts) => {
                apply(&mut f, &mut opts.program)?;
                for arg in opts.args.iter_mut() {
                    apply(&mut f, arg)?;
                }
                if let Some(cwd) = opts.cwd.as_mut() {
                    apply(&mut f, cwd)?;
                }
                for value in opts.env.values_mut() {
                    apply(&mut f, value)?;
                }
            }
            Action::Shell(opts) => {
                apply(&mut f, &mut opts.cmd)?;
                if let Some(cwd) = opts.cwd.as_mut() {
                    apply(&mut f, cwd)?;
                }
                for value in opts.env.values_mut() {
                    apply(&mut f, value)?;
                }
            }
            Action::Clean(opts) => {
                for path in opts.paths.iter_mut() {
                    apply(&mut f, path)?;
                }
            }
            Action::Copy(opts) => {
                for file in opts.files.iter_mut() {
                    for src in file.src.iter_mut() {
                        apply(&mut f, src)?;
                    }
                    apply(&mut f, &mut file.dest)?;
                }
            }
            Action::Concat(opts) => {
                for src in opts.src.iter_mut() {
                    apply(&mut f, src)?;
                }
                apply(&mut f, &mut opts.dest)?;
            }
            Action::Process(opts) => {
                apply(&mut f, &mut opts.program)?;
                for arg in opts.args.iter_mut() {
                    apply(&mut f, arg)?;
                }
                if let Some(cwd) = opts.cwd.as_mut() {
                    apply(&mut f, cwd)?;
                }
                for value in opts.env.values_mut() {
                    apply(&mut f, value)?;
                }
                for pattern in opts.restart_on.iter_mut() {
                    apply(&mut f, pattern)?;
                }
            }
            Action::Watch(_) | Action::Concurrent(_) => {}
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Command(opts) => {
                write!(f, "command `{}", opts.program)?;
                for arg in &opts.args {
                    write!(f, " {arg}")?;
                }
                f.write_str("`")
            }
            Action::Shell(opts) => write!(f, "shell `{}`", opts.cmd),
            Action::Clean(opts) => write!(f, "clean {:?}", opts.paths),
            Action::Copy(opts) => {
                let dests: Vec<&str> = opts.files.iter().map(|c| c.dest.as_str()).collect();
                write!(f, "copy -> {dests:?}")
            }
            Action::Concat(opts) => write!(f, "concat {:?} -> {}", opts.src, opts.dest),
            Action::Process(opts) => write!(f, "process `{}`", opts.program),
            Action::Watch(opts) if opts.rules.is_empty() => f.write_str("watch (all rules)"),
            Action::Watch(opts) => write!(f, "watch {:?}", opts.rules),
            Action::Concurrent(opts) => write!(f, "concurrent group '{}'", opts.group),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("`{field}` must not be empty"));
    }
    Ok(())
}

fn validate_cwd(cwd: Option<&str>) -> Result<(), String> {
    match cwd {
        Some(dir) => require_inside_root(dir),
        None => Ok(()),
    }
}

/// Reject absolute paths and `..` components: every path an action touches
/// stays under the project root.
fn require_inside_root(path: &str) -> Result<(), String> {
    let p = std::path::Path::new(path);
    if p.is_absolute() || path.starts_with('/') {
        return Err(format!("path '{path}' must be relative to the project root"));
    }
    if p.components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(format!("path '{path}' must not contain '..'"));
    }
    Ok(())
}

fn validate_glob(pattern: &str) -> Result<(), String> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| format!("invalid glob pattern '{pattern}': {e}"))
}

/// Accept either `"a"` or `["a", "b"]`.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
