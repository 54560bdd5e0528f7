use std::fmt;

use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Name of a `[group.<name>]` process group.
pub type GroupName = String;

/// How the supervisor treats a process-group member.
///
/// - `OneShot`: expected to finish; a failure aborts the whole group.
/// - `LongLived`: expected to keep running (server, watcher); exiting is
///   reported but does not abort siblings unless the group says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberMode {
    OneShot,
    LongLived,
}

impl fmt::Display for MemberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberMode::OneShot => f.write_str("one_shot"),
            MemberMode::LongLived => f.write_str("long_lived"),
        }
    }
}

/// Which stream a line of collaborator output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}
