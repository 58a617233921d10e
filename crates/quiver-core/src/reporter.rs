//! Reporter trait for dependency injection
//!
//! Core logic reports per-package progress through this trait without being
//! coupled to a terminal. Every package argument owns one display *slot*;
//! output for different slots must never interleave.

use tokio::sync::oneshot;

/// Index of one package argument's display line.
pub type Slot = usize;

/// Tone of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Neutral progress.
    Info,
    /// Terminal success.
    Success,
    /// Terminal failure.
    Failure,
    /// De-emphasized (e.g. "already installed").
    Muted,
}

/// Sink for user-facing progress. Reporting never affects control flow.
pub trait Reporter: Send + Sync {
    /// Set the label shown in front of every line of `slot`.
    fn set_prefix(&self, slot: Slot, prefix: &str);

    /// Replace the status line of `slot`.
    fn status(&self, slot: Slot, level: Level, msg: &str);

    /// Show `msg` as in progress until `done` resolves or its sender is dropped.
    fn working(&self, slot: Slot, msg: &str, done: oneshot::Receiver<()>);

    /// Update the download progress of `slot`.
    fn downloading(&self, slot: Slot, current: u64, total: Option<u64>);

    /// Log an informational message outside any slot.
    fn info(&self, msg: &str);

    /// Log a warning outside any slot.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn set_prefix(&self, slot: Slot, prefix: &str) {
        (**self).set_prefix(slot, prefix);
    }
    fn status(&self, slot: Slot, level: Level, msg: &str) {
        (**self).status(slot, level, msg);
    }
    fn working(&self, slot: Slot, msg: &str, done: oneshot::Receiver<()>) {
        (**self).working(slot, msg, done);
    }
    fn downloading(&self, slot: Slot, current: u64, total: Option<u64>) {
        (**self).downloading(slot, current, total);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// Completion signal for a [`Reporter::working`] line.
///
/// The line stops animating when the guard is finished or dropped, so an
/// early return through `?` never leaves a spinner running.
#[derive(Debug)]
pub struct Working(Option<oneshot::Sender<()>>);

impl Working {
    /// Start a working line on `slot`.
    pub fn start(reporter: &dyn Reporter, slot: Slot, msg: &str) -> Self {
        let (tx, rx) = oneshot::channel();
        reporter.working(slot, msg, rx);
        Self(Some(tx))
    }

    /// Stop the animation.
    pub fn finish(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Working {
    fn drop(&mut self) {
        self.signal();
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn set_prefix(&self, _: Slot, _: &str) {}
    fn status(&self, _: Slot, _: Level, _: &str) {}
    fn working(&self, _: Slot, _: &str, _: oneshot::Receiver<()>) {}
    fn downloading(&self, _: Slot, _: u64, _: Option<u64>) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<oneshot::Receiver<()>>>);

    impl Reporter for Capture {
        fn set_prefix(&self, _: Slot, _: &str) {}
        fn status(&self, _: Slot, _: Level, _: &str) {}
        fn working(&self, _: Slot, _: &str, done: oneshot::Receiver<()>) {
            self.0.lock().unwrap().push(done);
        }
        fn downloading(&self, _: Slot, _: u64, _: Option<u64>) {}
        fn info(&self, _: &str) {}
        fn warning(&self, _: &str) {}
    }

    #[test]
    fn test_working_signals_on_finish() {
        let capture = Capture::default();
        Working::start(&capture, 0, "Finding recipe").finish();
        let mut rx = capture.0.lock().unwrap().pop().unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_working_signals_on_drop() {
        let capture = Capture::default();
        {
            let _guard = Working::start(&capture, 0, "Finding recipe");
        }
        let mut rx = capture.0.lock().unwrap().pop().unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
