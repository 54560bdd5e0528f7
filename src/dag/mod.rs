// src/dag/mod.rs

//! Task graph representation and plan resolution.
//!
//! - [`registry`] stores named tasks and their declared steps.
//! - [`resolver`] expands a task name into a flat [`ExecutionPlan`],
//!   detecting cycles along the way.
//! - [`plan`] holds the resolved plan types.
//! - [`graph`] is the whole-configuration graph used at load time to reject
//!   cycles (including ones that pass through process groups).

pub mod graph;
pub mod plan;
pub mod registry;
pub mod resolver;

pub use graph::TaskGraph;
pub use plan::{ExecutionPlan, PlanStep};
pub use registry::{Step, Task, TaskRegistry};
pub use resolver::Resolver;
