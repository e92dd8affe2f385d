//! Structured observability events for workflow runs.
//!
//! Each function emits a single `tracing` event with a stable `event`
//! field, so log pipelines can filter on `event = "run.started"` etc.
//! without parsing message text.

use tracing::{info, warn};

/// RAII guard that keeps a `verdant.run` span entered for its lifetime.
///
/// Every log line emitted while the guard is alive carries the `run_id`
/// field, which is how per-run log slicing works downstream.
pub struct WorkflowSpan {
    _span: tracing::span::EnteredSpan,
}

impl WorkflowSpan {
    /// Build the run-scoped span without entering it, for attaching to
    /// futures with `tracing::Instrument` (an entered guard is not
    /// `Send`, so it cannot be held across `.await` in spawned tasks).
    pub(crate) fn span(run_id: &str) -> tracing::Span {
        tracing::info_span!("verdant.run", run_id = %run_id)
    }

    /// Enter a run-scoped span. Dropping the guard exits the span.
    pub fn enter(run_id: &str) -> Self {
        let span = Self::span(run_id).entered();
        Self { _span: span }
    }
}

/// A new run was created in the journal.
pub fn emit_run_started(run_id: &str, workflow: &str) {
    info!(event = "run.started", run_id = %run_id, workflow = %workflow);
}

/// An interrupted run was picked up again from its journal.
pub fn emit_run_resumed(run_id: &str, workflow: &str, replayed_events: u64) {
    info!(
        event = "run.resumed",
        run_id = %run_id,
        workflow = %workflow,
        replayed_events,
    );
}

/// A journal event was appended for a run.
pub fn emit_event_appended(run_id: &str, kind: &str, seq: u64) {
    info!(event = "run.event_appended", run_id = %run_id, kind = %kind, seq);
}

/// A workflow entered a named stage.
pub fn emit_stage_entered(run_id: &str, stage: &str) {
    info!(event = "run.stage_entered", run_id = %run_id, stage = %stage);
}

/// An activity attempt failed and will be retried after a backoff.
pub fn emit_activity_retry(activity: &str, attempt: u32, max_attempts: u32, error: &str) {
    warn!(
        event = "activity.retry",
        activity = %activity,
        attempt,
        max_attempts,
        error = %error,
    );
}

/// A run reached a terminal state.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, total_events: u64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms,
        total_events,
        success,
    );
}

/// Finalizing a run failed; the journal may still show it as running.
pub fn emit_run_finalize_error(run_id: &str, error: &str) {
    warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_span_enters_and_drops() {
        let guard = WorkflowSpan::enter("test-run-id");
        emit_stage_entered("test-run-id", "scanning");
        drop(guard);
    }
}
