//! Queryable in-flight status for running workflows.
//!
//! A workflow owns a [`StatusCell`] and mutates it under the lock; the
//! caller holds a [`StatusReader`] and snapshots it at any time without
//! blocking the workflow for longer than the clone. Updates happen as a
//! single closure under the write lock, so a reader never observes a
//! half-applied update.

use std::sync::{Arc, RwLock};

/// Writer side: owned by the running workflow.
pub struct StatusCell<T> {
    inner: Arc<RwLock<T>>,
}

impl<T: Clone + Default> StatusCell<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(T::default())),
        }
    }
}

impl<T: Clone + Default> Default for StatusCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> StatusCell<T> {
    /// Apply one atomic update to the status.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut guard = self.inner.write().unwrap();
        f(&mut guard);
    }

    /// Clone the current status.
    pub fn snapshot(&self) -> T {
        self.inner.read().unwrap().clone()
    }

    /// Hand out a read-only view.
    pub fn reader(&self) -> StatusReader<T> {
        StatusReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Reader side: cheap to clone, safe to poll from any task.
pub struct StatusReader<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for StatusReader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> StatusReader<T> {
    /// Clone the current status.
    pub fn get(&self) -> T {
        self.inner.read().unwrap().clone()
    }
}
