//! Global atomic counters for Verdant observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters — no allocations, no locking.
pub struct Metrics {
    runs_started: AtomicU64,
    events_appended: AtomicU64,
    activities_invoked: AtomicU64,
    replays_executed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            events_appended: AtomicU64::new(0),
            activities_invoked: AtomicU64::new(0),
            replays_executed: AtomicU64::new(0),
        }
    }

    /// Increment the runs-started counter by one.
    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    /// Increment the events-appended counter by one.
    pub fn inc_events_appended(&self) {
        self.events_appended.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_appended", "counter incremented");
    }

    /// Increment the activities-invoked counter by one.
    ///
    /// Counts attempts, not logical activities: a call retried twice
    /// increments this three times.
    pub fn inc_activities_invoked(&self) {
        self.activities_invoked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "activities_invoked", "counter incremented");
    }

    /// Increment the replays-executed counter by one.
    pub fn inc_replays(&self) {
        self.replays_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "replays_executed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run, CLI exit, etc.)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            events_appended = self.events_appended(),
            activities_invoked = self.activities_invoked(),
            replays_executed = self.replays_executed(),
        );
    }

    /// Read the current runs-started count.
    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    /// Read the current events-appended count.
    pub fn events_appended(&self) -> u64 {
        self.events_appended.load(Ordering::Relaxed)
    }

    /// Read the current activities-invoked count.
    pub fn activities_invoked(&self) -> u64 {
        self.activities_invoked.load(Ordering::Relaxed)
    }

    /// Read the current replays-executed count.
    pub fn replays_executed(&self) -> u64 {
        self.replays_executed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.events_appended.store(0, Ordering::Relaxed);
        self.activities_invoked.store(0, Ordering::Relaxed);
        self.replays_executed.store(0, Ordering::Relaxed);
    }
}
