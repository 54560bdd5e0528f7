// src/watch/trigger.rs

//! Pure core of a watch session.
//!
//! [`WatchTrigger`] turns relative changed paths into queued rule runs. It
//! owns no channels, timers or tasks: callers pass `now` explicitly, which
//! keeps debounce and ordering behaviour unit-testable. The async shell that
//! feeds it lives in `watch::session`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::types::TaskName;
use crate::watch::debounce::Debouncer;
use crate::watch::hash::ContentHashes;
use crate::watch::rules::{collect_matching_files, WatchRule};

/// A rule run waiting to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredRun {
    pub rule: String,
    pub tasks: Vec<TaskName>,
    /// Relative path whose change caused the run.
    pub path: String,
}

#[derive(Debug)]
pub struct WatchTrigger {
    rules: Vec<WatchRule>,
    debouncer: Debouncer,
    queue: VecDeque<TriggeredRun>,
    queue_length: usize,
    hashes: ContentHashes,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl WatchTrigger {
    /// `queue_length` is clamped to at least 1.
    pub fn new(
        rules: Vec<WatchRule>,
        debounce: Duration,
        queue_length: usize,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rules,
            debouncer: Debouncer::new(debounce),
            queue: VecDeque::new(),
            queue_length: queue_length.max(1),
            hashes: ContentHashes::new(),
            fs,
            root: root.into(),
        }
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    /// Record the current content hash of every file watched by a
    /// `use_hash` rule, so the first no-op save is already suppressed.
    pub fn prime_hashes(&mut self) {
        for rule in self.rules.iter().filter(|r| r.use_hash()) {
            let set = match crate::watch::rules::build_globset(rule.files()) {
                Ok(set) => set,
                Err(err) => {
                    warn!(rule = %rule.name(), error = %err, "could not compile patterns for hashing");
                    continue;
                }
            };
            match collect_matching_files(self.fs.as_ref(), &self.root, &set) {
                Ok(files) => {
                    for file in files {
                        self.hashes.prime(self.fs.as_ref(), &file);
                    }
                }
                Err(err) => {
                    warn!(rule = %rule.name(), error = %err, "failed to collect watched files for hashing");
                }
            }
        }
    }

    /// Record a change to `rel_path` (relative to the project root).
    ///
    /// Returns false if no rule watches the path; such events are dropped
    /// before debouncing.
    pub fn record_change(&mut self, rel_path: &str, now: Instant) -> bool {
        if !self.rules.iter().any(|r| r.matches(rel_path)) {
            return false;
        }
        debug!(path = %rel_path, "watched path changed; (re)arming debounce");
        self.debouncer.record(rel_path, now);
        true
    }

    /// When the next debounced path becomes due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Fire every path whose debounce window has elapsed.
    ///
    /// For each due path, every matching rule is queued in declaration order.
    /// Returns the runs that were newly queued by this call.
    pub fn fire_due(&mut self, now: Instant) -> Vec<TriggeredRun> {
        let mut queued = Vec::new();

        for path in self.debouncer.take_due(now) {
            let matching: Vec<usize> = self
                .rules
                .iter()
                .enumerate()
                .filter(|(_, r)| r.matches(&path))
                .map(|(i, _)| i)
                .collect();

            let needs_hash = matching.iter().any(|&i| self.rules[i].use_hash());
            let content_changed = if needs_hash {
                let abs = self.root.join(&path);
                self.hashes.changed(self.fs.as_ref(), &abs)
            } else {
                true
            };

            for i in matching {
                let rule = &self.rules[i];
                if rule.use_hash() && !content_changed {
                    info!(rule = %rule.name(), path = %path, "content unchanged; skipping trigger");
                    continue;
                }
                let run = TriggeredRun {
                    rule: rule.name().to_string(),
                    tasks: rule.tasks().to_vec(),
                    path: path.clone(),
                };
                if self.enqueue(run.clone()) {
                    queued.push(run);
                }
            }
        }

        queued
    }

    /// Pop the next run to execute, FIFO.
    pub fn next_run(&mut self) -> Option<TriggeredRun> {
        self.queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is waiting to be debounced or run.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.debouncer.is_empty()
    }

    fn enqueue(&mut self, run: TriggeredRun) -> bool {
        if self.queue.iter().any(|q| q.rule == run.rule) {
            debug!(rule = %run.rule, "rule already queued; merging trigger");
            return false;
        }
        if self.queue.len() >= self.queue_length {
            warn!(
                rule = %run.rule,
                queue_length = self.queue_length,
                "watch queue full; dropping trigger"
            );
            return false;
        }
        debug!(rule = %run.rule, path = %run.path, "queued watch run");
        self.queue.push_back(run);
        true
    }
}
