// src/engine/mod.rs

//! Plan execution.
//!
//! - [`runner`] runs an [`ExecutionPlan`](crate::dag::ExecutionPlan) step by
//!   step through a collaborator.
//! - [`supervisor`] runs `concurrent` steps: one task per process-group
//!   member, fail-fast for one-shot members, bounded shutdown.

pub mod runner;
pub mod supervisor;

pub use runner::{Engine, RunReport};
pub use supervisor::run_concurrent;
