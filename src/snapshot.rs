//! Atomically swappable shared snapshots
//!
//! The registry and the policy are immutable values shared process-wide.
//! Readers capture an `Arc` at call entry and keep it for the whole call;
//! writers replace the `Arc` wholesale. A reader therefore observes either
//! the old snapshot or the new one, never a torn mix, and an in-flight
//! verification keeps running on the snapshot it captured even if a
//! hot-reload lands mid-call.

use std::sync::{Arc, RwLock};

/// An immutable value behind a swappable reference.
#[derive(Debug)]
pub struct SharedSnapshot<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SharedSnapshot<T> {
    /// Wrap an initial snapshot.
    pub fn new(value: T) -> Self {
        Self { inner: RwLock::new(Arc::new(value)) }
    }

    /// Capture the current snapshot.
    pub fn load(&self) -> Arc<T> {
        // A poisoned lock only means a writer panicked mid-swap; the Arc
        // inside is still either the old or the new value, so reads recover.
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot. Readers holding the old `Arc` are unaffected.
    pub fn store(&self, value: T) {
        let next = Arc::new(value);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
