// src/config/mod.rs

//! Configuration loading and validation for taskweave.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate file-level invariants (`validate.rs`).
//! - Substitute `${var}` references (`vars.rs`).

pub mod loader;
pub mod model;
pub mod validate;
pub mod vars;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigFile, ConfigSection, GroupConfig, GroupMemberConfig, GroupMemberDetail, RawConfigFile,
    StepConfig, TaskConfig, WatchRuleConfig,
};
