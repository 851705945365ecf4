//! Test utilities for fixture-factory crates
//!
//! ## EnvGuard
//!
//! Sets or removes an environment variable for the lifetime of the guard and
//! restores the original value on drop. Guards are serialized through a
//! process-wide lock so tests touching the same variables cannot interleave.
//!
//! ```no_run
//! use fixture_factory_test_utils::EnvGuard;
//!
//! #[test]
//! fn test_something() {
//!     let _env = EnvGuard::set("TFF_SKIP_DESTROY", "1");
//!     // TFF_SKIP_DESTROY is "1" until _env is dropped
//! }
//! ```
//!
//! ## TeardownLog
//!
//! A shared, ordered record of what construction and teardown code did,
//! used to assert ordering from inside test bodies.

use std::sync::{Arc, Mutex, MutexGuard};

/// Global mutex to serialize environment variable changes
static ENV_VAR_TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_VAR_TEST_LOCK.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Environment variable test lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// RAII guard for a single environment variable
pub struct EnvGuard {
    key: String,
    original: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Set `key` to `value` until the guard is dropped
    pub fn set(key: impl Into<String>, value: impl AsRef<str>) -> Self {
        let guard = Self::capture(key.into());
        std::env::set_var(&guard.key, value.as_ref());
        guard
    }

    /// Remove `key` until the guard is dropped
    pub fn remove(key: impl Into<String>) -> Self {
        let guard = Self::capture(key.into());
        std::env::remove_var(&guard.key);
        guard
    }

    fn capture(key: String) -> Self {
        let lock = lock_env();
        let original = std::env::var(&key).ok();
        Self {
            key,
            original,
            _lock: lock,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(&self.key, value),
            None => std::env::remove_var(&self.key),
        }
    }
}

/// Ordered log of lifecycle events shared between a test and its factories
#[derive(Debug, Clone, Default)]
pub struct TeardownLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TeardownLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Snapshot of all events so far
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Events starting with `prefix`, e.g. every `"destroy:"` entry
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.lock().iter().any(|e| e == entry)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Teardown log lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
