//! Work closures for tests.

use anyhow::anyhow;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A loader that succeeds with a fixed count and counts its calls.
#[derive(Debug, Clone)]
pub struct CountingLoader {
    count: usize,
    calls: Arc<AtomicUsize>,
}

impl CountingLoader {
    /// Creates a loader returning `count` on every call.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a work closure sharing this loader's call counter.
    #[must_use]
    pub fn loader(&self) -> impl Fn() -> anyhow::Result<usize> + Send + Sync + 'static {
        let count = self.count;
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(count)
        }
    }

    /// Returns how many times a closure from this loader ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A loader that fails a given number of times, then succeeds.
#[derive(Debug, Clone)]
pub struct FlakyLoader {
    message: String,
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FlakyLoader {
    /// Creates a loader that fails `failures` times with `message`.
    #[must_use]
    pub fn new(failures: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failures_left: Arc::new(AtomicUsize::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a loader that never succeeds.
    #[must_use]
    pub fn always(message: impl Into<String>) -> Self {
        Self::new(usize::MAX, message)
    }

    /// Returns a work closure sharing this loader's state.
    #[must_use]
    pub fn loader(&self) -> impl Fn() -> anyhow::Result<usize> + Send + Sync + 'static {
        let message = self.message.clone();
        let failures_left = Arc::clone(&self.failures_left);
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let failing = failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                Err(anyhow!(message.clone()))
            } else {
                Ok(1)
            }
        }
    }

    /// Makes every later call succeed.
    pub fn heal(&self) {
        self.failures_left.store(0, Ordering::SeqCst);
    }

    /// Returns how many times a closure from this loader ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Shared log of the order in which loaders ran.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a work closure that appends `id` to the log and returns
    /// `count`.
    #[must_use]
    pub fn loader(
        &self,
        id: impl Into<String>,
        count: usize,
    ) -> impl Fn() -> anyhow::Result<usize> + Send + Sync + 'static {
        let id = id.into();
        let entries = Arc::clone(&self.entries);
        move || {
            entries.lock().push(id.clone());
            Ok(count)
        }
    }

    /// Returns the ids in the order their loaders ran.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the position of the first run of `id`.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == id)
    }

    /// Returns how many times `id` ran.
    #[must_use]
    pub fn count_of(&self, id: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == id).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_loader() {
        let counter = CountingLoader::new(7);
        let load = counter.loader();
        assert_eq!(load().unwrap(), 7);
        assert_eq!(load().unwrap(), 7);
        assert_eq!(counter.calls(), 2);
    }

    #[test]
    fn test_flaky_loader_recovers() {
        let flaky = FlakyLoader::new(1, "not yet");
        let load = flaky.loader();
        assert_eq!(load().unwrap_err().to_string(), "not yet");
        assert_eq!(load().unwrap(), 1);
        assert_eq!(flaky.calls(), 2);
    }

    #[test]
    fn test_flaky_loader_heal() {
        let flaky = FlakyLoader::always("down");
        let load = flaky.loader();
        assert!(load().is_err());
        flaky.heal();
        assert!(load().is_ok());
    }

    #[test]
    fn test_execution_log() {
        let log = ExecutionLog::new();
        log.loader("a", 1)().unwrap();
        log.loader("b", 1)().unwrap();
        log.loader("a", 1)().unwrap();
        assert_eq!(log.entries(), vec!["a", "b", "a"]);
        assert_eq!(log.position("b"), Some(1));
        assert_eq!(log.count_of("a"), 2);
    }
}
