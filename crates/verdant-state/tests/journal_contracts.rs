//! Trait-contract tests for the journal and draft store.
//!
//! Every test runs against both the in-memory fake and the SurrealDB
//! in-memory engine, so the fakes stay honest.

use std::collections::BTreeMap;

use serde_json::json;
use verdant_state::fakes::{MemoryDraftStore, MemoryJournal};
use verdant_state::{
    ContentDigest, DraftStore, JournalEvent, RunMetadata, RunStatus, RunSummary,
    StorageError, SurrealDraftStore, SurrealJournal, WorkflowJournal,
};

fn metadata(workflow: &str) -> RunMetadata {
    RunMetadata {
        workflow: workflow.to_string(),
        subject: Some("acme/widget".to_string()),
        tags: json!({"limit": 3}),
    }
}

fn event(seq: u64, kind: &str) -> JournalEvent {
    JournalEvent {
        seq,
        kind: kind.to_string(),
        payload: json!({"step": format!("step-{seq}")}),
        timestamp: chrono::Utc::now(),
    }
}

fn summary(success: bool) -> RunSummary {
    RunSummary {
        total_events: 3,
        outcome_digest: Some(ContentDigest::from_bytes(b"outcome")),
        duration_ms: 42,
        success,
    }
}

async fn journals() -> Vec<Box<dyn WorkflowJournal>> {
    vec![
        Box::new(MemoryJournal::new()),
        Box::new(SurrealJournal::in_memory().await.expect("surreal mem")),
    ]
}

async fn draft_stores() -> Vec<Box<dyn DraftStore>> {
    vec![
        Box::new(MemoryDraftStore::new()),
        Box::new(SurrealDraftStore::in_memory().await.expect("surreal mem")),
    ]
}

// ---------------------------------------------------------------------------
// WorkflowJournal contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_and_get_run_round_trips_metadata() {
    for journal in journals().await {
        let digest = ContentDigest::from_bytes(b"input");
        let run_id = journal
            .create_run(&digest, metadata("janitor"))
            .await
            .expect("create_run");

        let record = journal.get_run(&run_id).await.expect("get_run");
        assert_eq!(record.run_id, run_id);
        assert_eq!(record.input_digest, digest);
        assert_eq!(record.metadata.workflow, "janitor");
        assert_eq!(record.metadata.subject.as_deref(), Some("acme/widget"));
        assert_eq!(record.metadata.tags, json!({"limit": 3}));
        assert_eq!(record.status, RunStatus::Running);
        assert!(record.summary.is_none(), "running run has no summary");
        assert!(record.completed_at.is_none());
    }
}

#[tokio::test]
async fn events_come_back_in_seq_order() {
    for journal in journals().await {
        let digest = ContentDigest::from_bytes(b"input");
        let run_id = journal
            .create_run(&digest, metadata("batch_gardening"))
            .await
            .expect("create_run");

        // Append out of order; retrieval must sort by seq.
        journal.append_event(&run_id, event(2, "step_completed")).await.unwrap();
        journal.append_event(&run_id, event(1, "stage_entered")).await.unwrap();
        journal.append_event(&run_id, event(3, "step_failed")).await.unwrap();

        let events = journal.get_events(&run_id).await.expect("get_events");
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(events[0].kind, "stage_entered");
        assert_eq!(events[2].kind, "step_failed");
    }
}

#[tokio::test]
async fn complete_run_is_terminal() {
    for journal in journals().await {
        let digest = ContentDigest::from_bytes(b"input");
        let run_id = journal
            .create_run(&digest, metadata("portfolio"))
            .await
            .expect("create_run");

        journal.append_event(&run_id, event(1, "stage_entered")).await.unwrap();
        journal.complete_run(&run_id, summary(true)).await.expect("complete");

        let record = journal.get_run(&run_id).await.unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        let s = record.summary.expect("terminal run has summary");
        assert!(s.success);
        assert_eq!(s.total_events, 3);
        assert!(record.completed_at.is_some());

        // Terminal runs are immutable.
        let append = journal.append_event(&run_id, event(2, "stage_entered")).await;
        assert!(
            matches!(append, Err(StorageError::InvalidRunState { .. })),
            "append after complete must be rejected, got {append:?}"
        );
        let complete_again = journal.complete_run(&run_id, summary(true)).await;
        assert!(matches!(
            complete_again,
            Err(StorageError::InvalidRunState { .. })
        ));
    }
}

#[tokio::test]
async fn fail_and_cancel_record_unsuccessful_summaries() {
    for journal in journals().await {
        let digest = ContentDigest::from_bytes(b"input");

        let failed = journal.create_run(&digest, metadata("janitor")).await.unwrap();
        journal.fail_run(&failed, summary(false)).await.expect("fail");
        let record = journal.get_run(&failed).await.unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(!record.summary.unwrap().success);

        let cancelled = journal.create_run(&digest, metadata("janitor")).await.unwrap();
        journal.cancel_run(&cancelled, summary(false)).await.expect("cancel");
        let record = journal.get_run(&cancelled).await.unwrap();
        assert_eq!(record.status, RunStatus::Cancelled);
    }
}

#[tokio::test]
async fn unknown_run_id_is_rejected() {
    for journal in journals().await {
        let ghost = verdant_state::RunId::new();
        assert!(matches!(
            journal.get_run(&ghost).await,
            Err(StorageError::RunNotFound { .. })
        ));
        assert!(matches!(
            journal.append_event(&ghost, event(1, "stage_entered")).await,
            Err(StorageError::RunNotFound { .. })
        ));
        assert!(matches!(
            journal.get_events(&ghost).await,
            Err(StorageError::RunNotFound { .. })
        ));
    }
}

#[tokio::test]
async fn list_runs_filters_by_workflow_kind() {
    for journal in journals().await {
        let digest = ContentDigest::from_bytes(b"input");
        journal.create_run(&digest, metadata("janitor")).await.unwrap();
        journal.create_run(&digest, metadata("janitor")).await.unwrap();
        journal.create_run(&digest, metadata("portfolio")).await.unwrap();

        let janitors = journal.list_runs(Some("janitor")).await.unwrap();
        assert_eq!(janitors.len(), 2);
        assert!(janitors.iter().all(|r| r.metadata.workflow == "janitor"));

        let all = journal.list_runs(None).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}

// ---------------------------------------------------------------------------
// DraftStore contract
// ---------------------------------------------------------------------------

fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn save_draft_replaces_the_whole_draft() {
    for store in draft_stores().await {
        store
            .save_draft(7, files(&[("README.md", "v1"), ("ARCHITECTURE.md", "arch")]))
            .await
            .expect("first save");
        store
            .save_draft(7, files(&[("CONTRIBUTING.md", "v2")]))
            .await
            .expect("second save");

        let draft = store.load_draft(7).await.unwrap().expect("draft exists");
        assert_eq!(draft.repo_id, 7);
        assert_eq!(
            draft.files.keys().collect::<Vec<_>>(),
            vec!["CONTRIBUTING.md"],
            "second save must fully replace the first"
        );
    }
}

#[tokio::test]
async fn drafts_are_isolated_per_repository() {
    for store in draft_stores().await {
        store.save_draft(1, files(&[("README.md", "one")])).await.unwrap();
        store.save_draft(2, files(&[("README.md", "two")])).await.unwrap();

        let first = store.load_draft(1).await.unwrap().expect("repo 1 draft");
        let second = store.load_draft(2).await.unwrap().expect("repo 2 draft");
        assert_eq!(first.files["README.md"], "one");
        assert_eq!(second.files["README.md"], "two");
    }
}

#[tokio::test]
async fn clear_draft_removes_and_is_idempotent() {
    for store in draft_stores().await {
        store.save_draft(9, files(&[("README.md", "x")])).await.unwrap();
        store.clear_draft(9).await.expect("clear");
        assert!(store.load_draft(9).await.unwrap().is_none());

        // Clearing an absent draft is a no-op.
        store.clear_draft(9).await.expect("clear again");
        assert!(store.load_draft(9).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn load_draft_returns_none_when_absent() {
    for store in draft_stores().await {
        assert!(store.load_draft(12345).await.unwrap().is_none());
    }
}
