//! Contains the [Reporter] abstraction, used by the
//! [ConflictSimulator][crate::simulator::ConflictSimulator] to publish
//! human-readable progress lines.

use std::sync::Arc;

use parking_lot::Mutex;

/// Receives human-readable progress and outcome lines.
///
/// Reporting is purely observational: implementations must not
/// influence the outcome of the operations being reported.
pub trait Reporter: Send + Sync + 'static {
    /// Publishes a single line of text.
    fn report(&self, line: &str);
}

/// [Reporter] that emits each line as an `INFO` event through the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, line: &str) {
        tracing::info!("{line}");
    }
}

/// [Reporter] that keeps every line in memory.
///
/// Clones share the same list of lines.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Returns all the lines reported so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Reporter for Recorder {
    fn report(&self, line: &str) {
        self.lines.lock().push(line.to_owned());
    }
}

impl<R> Reporter for Arc<R>
where
    R: Reporter + ?Sized,
{
    fn report(&self, line: &str) {
        (**self).report(line);
    }
}
