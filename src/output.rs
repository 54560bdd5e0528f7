// src/output.rs

//! Labelled collaborator output.
//!
//! Every line a collaborator prints is handed to an [`OutputSink`] together
//! with the label of the step that produced it. Sinks must emit each line as
//! one unit, so concurrent group members interleave by whole lines.

use std::fmt::Debug;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use crate::types::OutputStream;

pub trait OutputSink: Send + Sync + Debug {
    fn line(&self, label: &str, stream: OutputStream, line: &str);
}

/// Writes `[label] line` to the process's stdout/stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    // Serializes writers across both streams.
    lock: Mutex<()>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for ConsoleSink {
    fn line(&self, label: &str, stream: OutputStream, line: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // A closed stdout (e.g. `| head`) must not take the run down.
        let _ = match stream {
            OutputStream::Stdout => writeln!(std::io::stdout().lock(), "[{label}] {line}"),
            OutputStream::Stderr => writeln!(std::io::stderr().lock(), "[{label}] {line}"),
        };
    }
}

/// One captured line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub label: String,
    pub stream: OutputStream,
    pub line: String,
}

/// Keeps every line in memory, for tests.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<OutputLine>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.lock().clone()
    }

    /// Text of every line emitted under `label`, in order.
    pub fn lines_for(&self, label: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|l| l.label == label)
            .map(|l| l.line.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputLine>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutputSink for CaptureSink {
    fn line(&self, label: &str, stream: OutputStream, line: &str) {
        self.lock().push(OutputLine {
            label: label.to_string(),
            stream,
            line: line.to_string(),
        });
    }
}
