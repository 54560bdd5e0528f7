// src/watch/debounce.rs

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Trailing-edge debounce keyed by path.
///
/// Every event re-arms the path's deadline; the path becomes due once no new
/// event has arrived for `window`. Any number of events inside the window
/// therefore collapse into a single firing.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_event: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_event: HashMap::new(),
        }
    }

    /// Record an event for `path` at `now`.
    pub fn record(&mut self, path: &str, now: Instant) {
        self.last_event.insert(path.to_string(), now);
    }

    pub fn is_empty(&self) -> bool {
        self.last_event.is_empty()
    }

    /// Earliest instant at which some pending path becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_event.values().min().map(|&t| t + self.window)
    }

    /// Remove and return every path that is due at `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = self
            .last_event
            .iter()
            .filter(|&(_, &t)| now.saturating_duration_since(t) >= self.window)
            .map(|(p, &t)| (t, p.clone()))
            .collect();
        due.sort();

        for (_, path) in &due {
            self.last_event.remove(path);
        }
        due.into_iter().map(|(_, p)| p).collect()
    }
}
