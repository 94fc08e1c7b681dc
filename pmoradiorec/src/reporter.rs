//! Verbose output sink
//!
//! The engine and the supervisor receive a [`Reporter`] at construction and
//! send it the lines a user asked to see with `--verbose` (station, stream
//! URL, header and metadata lines, permission notices). Regular diagnostics
//! go through `tracing` and are independent of this.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Receives user-facing progress lines
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report(&self, line: &str);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&self, _line: &str) {}
}

/// Prints each line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&self, line: &str) {
        println!("{}", line);
    }
}

/// Keeps lines in memory, for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines reported so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Reporter matching a verbosity flag
pub fn reporter_for(verbose: bool) -> Arc<dyn Reporter> {
    if verbose {
        Arc::new(StdoutReporter)
    } else {
        Arc::new(SilentReporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_shares_lines() {
        let reporter = MemoryReporter::new();
        let clone = reporter.clone();
        clone.report("Recording jazz...");
        assert_eq!(reporter.lines(), vec!["Recording jazz...".to_string()]);
    }
}
