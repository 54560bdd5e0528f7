// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// the file-level checks and `${var}` substitution.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

/// Parse configuration from an in-memory TOML string.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks names, watch rules and groups, and substitutes variables.
///
/// Task references and cycles are checked when the result is turned into a
/// `Project`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// Default config path: `Taskweave.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskweave.toml")
}

/// Directory that relative paths in the config are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "web/Taskweave.toml"),
///   that directory is used.
/// - For a bare filename like "Taskweave.toml" (parent = ""), fall back to
///   the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
