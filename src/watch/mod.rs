// src/watch/mod.rs

//! File watching and change-triggered runs.
//!
//! - [`rules`] compiles `[[watch]]` entries into glob matchers.
//! - [`debounce`], [`hash`] and [`trigger`] form the pure core: relative
//!   paths in, ordered rule runs out.
//! - [`watcher`] wraps `notify`; [`session`] is the async loop that feeds
//!   the core and runs queued plans on the engine.

pub mod debounce;
pub mod hash;
pub mod path_utils;
pub mod rules;
pub mod session;
pub mod trigger;
pub mod watcher;

pub use debounce::Debouncer;
pub use hash::{compute_file_hash, ContentHashes};
pub use rules::WatchRule;
pub use session::{SessionReport, WatchSession};
pub use trigger::{TriggeredRun, WatchTrigger};
pub use watcher::{spawn_watcher, WatcherHandle};
