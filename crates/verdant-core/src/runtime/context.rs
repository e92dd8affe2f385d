//! Durable execution context for workflow runs.
//!
//! A [`WorkflowCtx`] journals every step outcome as it happens. When a
//! run is resumed after an interruption, the journal is replayed into a
//! step cache first; a step whose key is cached returns the journaled
//! outcome without re-executing its closure. Workflow code therefore
//! reads as straight-line async logic while surviving process restarts,
//! as long as every side effect goes through [`WorkflowCtx::step`] (or
//! [`WorkflowCtx::activity`]) under a stable key.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::activities::{ActivityError, ActivityResult};
use crate::error::{Result, WorkflowError};
use crate::events::{event_kind_str, EventKind};
use crate::metrics::METRICS;
use crate::obs;
use crate::runtime::invoke::invoke;
use crate::runtime::policy::ActivityOptions;
use verdant_state::{
    ContentDigest, JournalEvent, RunId, RunMetadata, RunRecord, RunStatus, RunSummary,
    StorageError, WorkflowJournal,
};

/// A journaled step outcome, as reconstructed from the event log.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

/// Replay state parsed from a run's journal.
#[derive(Default)]
struct ReplayState {
    outcomes: HashMap<String, StepOutcome>,
    order: Vec<String>,
    stages: HashSet<String>,
    last_seq: u64,
}

fn collect_replay_state(events: &[JournalEvent]) -> ReplayState {
    let mut state = ReplayState::default();
    for event in events {
        state.last_seq = state.last_seq.max(event.seq);
        match event.kind.as_str() {
            "step_completed" => {
                if let (Some(step), Some(output)) =
                    (event.payload["step"].as_str(), event.payload.get("output"))
                {
                    state.order.push(step.to_string());
                    state
                        .outcomes
                        .insert(step.to_string(), StepOutcome::Completed(output.clone()));
                }
            }
            "step_failed" => {
                if let Some(step) = event.payload["step"].as_str() {
                    let error = event.payload["error"]
                        .as_str()
                        .unwrap_or("unknown error")
                        .to_string();
                    state.order.push(step.to_string());
                    state
                        .outcomes
                        .insert(step.to_string(), StepOutcome::Failed(error));
                }
            }
            "stage_entered" => {
                if let Some(stage) = event.payload["stage"].as_str() {
                    state.stages.insert(stage.to_string());
                }
            }
            _ => {}
        }
    }
    state
}

/// Journal-backed execution context for one workflow run.
pub struct WorkflowCtx {
    journal: Arc<dyn WorkflowJournal>,
    run_id: RunId,
    seq: AtomicU64,
    replayed: HashMap<String, StepOutcome>,
    replay_order: Vec<String>,
    replayed_stages: HashSet<String>,
    started: Instant,
}

// Manual impl because the journal is a trait object without a `Debug`
// supertrait; every other field is shown.
impl std::fmt::Debug for WorkflowCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCtx")
            .field("run_id", &self.run_id)
            .field("seq", &self.seq)
            .field("replayed", &self.replayed)
            .field("replay_order", &self.replay_order)
            .field("replayed_stages", &self.replayed_stages)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl WorkflowCtx {
    /// Create a fresh run in the journal.
    ///
    /// The serialized input is stored as the run's tags, which is what
    /// makes the run resumable later without the caller re-supplying it.
    pub async fn begin<I: Serialize>(
        journal: Arc<dyn WorkflowJournal>,
        workflow: &str,
        subject: Option<String>,
        input: &I,
    ) -> Result<Self> {
        let tags = serde_json::to_value(input)?;
        let input_digest = ContentDigest::from_json(input)?;
        let metadata = RunMetadata {
            workflow: workflow.to_string(),
            subject,
            tags,
        };
        let run_id = journal.create_run(&input_digest, metadata).await?;
        METRICS.inc_runs_started();
        obs::emit_run_started(&run_id.to_string(), workflow);
        Ok(Self {
            journal,
            run_id,
            seq: AtomicU64::new(0),
            replayed: HashMap::new(),
            replay_order: Vec::new(),
            replayed_stages: HashSet::new(),
            started: Instant::now(),
        })
    }

    /// Rebuild the context for an interrupted run from its journal.
    ///
    /// Fails if the run is no longer `Running`. The returned record
    /// carries the metadata (workflow kind, serialized input) the caller
    /// needs to re-enter the right workflow.
    pub async fn resume(
        journal: Arc<dyn WorkflowJournal>,
        run_id: &RunId,
    ) -> Result<(Self, RunRecord)> {
        let record = journal.get_run(run_id).await?;
        if record.status != RunStatus::Running {
            return Err(WorkflowError::Journal(StorageError::InvalidRunState {
                run_id: run_id.to_string(),
                status: format!("{:?}", record.status),
                expected: "Running".to_string(),
            }));
        }
        let events = journal.get_events(run_id).await?;
        let state = collect_replay_state(&events);
        METRICS.inc_replays();
        obs::emit_run_resumed(
            &run_id.to_string(),
            &record.metadata.workflow,
            events.len() as u64,
        );
        let ctx = Self {
            journal,
            run_id: run_id.clone(),
            seq: AtomicU64::new(state.last_seq),
            replayed: state.outcomes,
            replay_order: state.order,
            replayed_stages: state.stages,
            started: Instant::now(),
        };
        Ok((ctx, record))
    }

    /// This run's identifier.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Append one event to the journal.
    pub async fn record(&self, kind: &EventKind, payload: serde_json::Value) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let kind_str = event_kind_str(kind);
        let event = JournalEvent {
            seq,
            kind: kind_str.clone(),
            payload,
            timestamp: Utc::now(),
        };
        METRICS.inc_events_appended();
        obs::emit_event_appended(&self.run_id.to_string(), &kind_str, seq);
        self.journal.append_event(&self.run_id, event).await?;
        Ok(())
    }

    /// Journal entry into a named stage. Skipped when the journal already
    /// shows this stage, so stages are recorded once per run.
    pub async fn enter_stage(&self, stage: &str) -> Result<()> {
        if self.replayed_stages.contains(stage) {
            return Ok(());
        }
        obs::emit_stage_entered(&self.run_id.to_string(), stage);
        self.record(
            &EventKind::StageEntered {
                stage: stage.to_string(),
            },
            json!({ "stage": stage }),
        )
        .await
    }

    /// Execute a step exactly once per run.
    ///
    /// On first execution the closure runs and its outcome, success or
    /// failure, is journaled under `key`. On replay the journaled outcome
    /// is returned and the closure is never called. Keys must be unique
    /// within a run and stable across resumes.
    pub async fn step<T, F, Fut>(&self, key: &str, run: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ActivityResult<T>>,
    {
        if let Some(outcome) = self.replayed.get(key) {
            return match outcome {
                StepOutcome::Completed(value) => Ok(serde_json::from_value(value.clone())?),
                StepOutcome::Failed(message) => {
                    Err(WorkflowError::Activity(ActivityError::Remote {
                        activity: key.to_string(),
                        message: message.clone(),
                    }))
                }
            };
        }

        match run().await {
            Ok(value) => {
                let output = serde_json::to_value(&value)?;
                self.record(
                    &EventKind::StepCompleted {
                        step: key.to_string(),
                    },
                    json!({ "step": key, "output": output }),
                )
                .await?;
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                self.record(
                    &EventKind::StepFailed {
                        step: key.to_string(),
                    },
                    json!({ "step": key, "error": message }),
                )
                .await?;
                Err(WorkflowError::Activity(err))
            }
        }
    }

    /// [`step`](Self::step) wrapping an activity call with its timeout
    /// and retry policy. Retries happen inside the step, so the journal
    /// records only the settled outcome.
    pub async fn activity<T, F, Fut>(
        &self,
        key: &str,
        opts: &ActivityOptions,
        call: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ActivityResult<T>>,
    {
        self.step(key, || invoke(key, opts, call)).await
    }

    /// True when `key` has a journaled outcome from a previous execution.
    pub fn is_replaying(&self, key: &str) -> bool {
        self.replayed.contains_key(key)
    }

    /// Position of `key` in the journal's settled-step order, when replayed.
    pub fn replay_position(&self, key: &str) -> Option<usize> {
        self.replay_order.iter().position(|k| k == key)
    }

    /// Mark the run completed, digesting the outcome into the summary.
    pub async fn finish_ok<T: Serialize>(&self, outcome: &T) -> Result<()> {
        let summary = self.summary(Some(ContentDigest::from_json(outcome)?), true);
        obs::emit_run_finished(
            &self.run_id.to_string(),
            summary.duration_ms,
            summary.total_events,
            true,
        );
        self.journal.complete_run(&self.run_id, summary).await?;
        Ok(())
    }

    /// Mark the run failed, digesting the outcome into the summary.
    pub async fn finish_failed<T: Serialize>(&self, outcome: &T) -> Result<()> {
        let summary = self.summary(Some(ContentDigest::from_json(outcome)?), false);
        obs::emit_run_finished(
            &self.run_id.to_string(),
            summary.duration_ms,
            summary.total_events,
            false,
        );
        self.journal.fail_run(&self.run_id, summary).await?;
        Ok(())
    }

    /// Best-effort failure mark used while propagating an error. Never
    /// fails itself; a journal error here is logged and swallowed so it
    /// cannot mask the original failure.
    pub async fn abandon(&self) {
        let summary = self.summary(None, false);
        obs::emit_run_finished(
            &self.run_id.to_string(),
            summary.duration_ms,
            summary.total_events,
            false,
        );
        if let Err(err) = self.journal.fail_run(&self.run_id, summary).await {
            obs::emit_run_finalize_error(&self.run_id.to_string(), &err.to_string());
        }
    }

    fn summary(&self, outcome_digest: Option<ContentDigest>, success: bool) -> RunSummary {
        RunSummary {
            total_events: self.seq.load(Ordering::SeqCst),
            outcome_digest,
            // Measures the finishing execution segment, not time spent
            // suspended between processes.
            duration_ms: self.started.elapsed().as_millis() as u64,
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use verdant_state::fakes::MemoryJournal;

    fn remote_err(msg: &str) -> ActivityError {
        ActivityError::Remote {
            activity: "fixture".to_string(),
            message: msg.to_string(),
        }
    }

    #[tokio::test]
    async fn test_step_outcome_is_cached_across_resume() {
        let journal: Arc<dyn WorkflowJournal> = Arc::new(MemoryJournal::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let ctx = WorkflowCtx::begin(journal.clone(), "fixture", None, &json!({"n": 1}))
            .await
            .unwrap();
        let counter = calls.clone();
        let value: u32 = ctx
            .step("compute", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(41)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 41);

        let (resumed, record) = WorkflowCtx::resume(journal, ctx.run_id()).await.unwrap();
        assert_eq!(record.metadata.workflow, "fixture");
        assert!(resumed.is_replaying("compute"));
        let counter = calls.clone();
        let replayed: u32 = resumed
            .step("compute", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(0)
                }
            })
            .await
            .unwrap();
        assert_eq!(replayed, 41);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_step_replays_as_the_same_error() {
        let journal: Arc<dyn WorkflowJournal> = Arc::new(MemoryJournal::new());
        let ctx = WorkflowCtx::begin(journal.clone(), "fixture", None, &json!({}))
            .await
            .unwrap();

        let first: Result<u32> = ctx.step("doomed", || async { Err(remote_err("down")) }).await;
        assert!(first.is_err());

        let (resumed, _) = WorkflowCtx::resume(journal, ctx.run_id()).await.unwrap();
        let second: Result<u32> = resumed.step("doomed", || async { Ok(9) }).await;
        match second.unwrap_err() {
            WorkflowError::Activity(ActivityError::Remote { activity, message }) => {
                assert_eq!(activity, "doomed");
                assert!(message.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sequence_continues_after_resume() {
        let journal: Arc<dyn WorkflowJournal> = Arc::new(MemoryJournal::new());
        let ctx = WorkflowCtx::begin(journal.clone(), "fixture", None, &json!({}))
            .await
            .unwrap();
        ctx.enter_stage("first").await.unwrap();
        let _: u32 = ctx.step("a", || async { Ok(1) }).await.unwrap();

        let (resumed, _) = WorkflowCtx::resume(journal.clone(), ctx.run_id())
            .await
            .unwrap();
        // Replayed stage is not journaled again.
        resumed.enter_stage("first").await.unwrap();
        let _: u32 = resumed.step("b", || async { Ok(2) }).await.unwrap();

        let events = journal.get_events(ctx.run_id()).await.unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_resume_rejects_terminal_runs() {
        let journal: Arc<dyn WorkflowJournal> = Arc::new(MemoryJournal::new());
        let ctx = WorkflowCtx::begin(journal.clone(), "fixture", None, &json!({}))
            .await
            .unwrap();
        ctx.finish_ok(&json!({"ok": true})).await.unwrap();

        let err = WorkflowCtx::resume(journal, ctx.run_id()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Journal(StorageError::InvalidRunState { .. })
        ));
    }

    #[tokio::test]
    async fn test_replay_position_reflects_journal_order() {
        let journal: Arc<dyn WorkflowJournal> = Arc::new(MemoryJournal::new());
        let ctx = WorkflowCtx::begin(journal.clone(), "fixture", None, &json!({}))
            .await
            .unwrap();
        let _: u32 = ctx.step("second-key", || async { Ok(1) }).await.unwrap();
        let _: u32 = ctx.step("first-key", || async { Ok(2) }).await.unwrap();

        let (resumed, _) = WorkflowCtx::resume(journal, ctx.run_id()).await.unwrap();
        assert_eq!(resumed.replay_position("second-key"), Some(0));
        assert_eq!(resumed.replay_position("first-key"), Some(1));
        assert_eq!(resumed.replay_position("missing"), None);
    }
}
