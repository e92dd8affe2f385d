//! Offline journal inspection.
//!
//! Reads a run's full event log back, verifies the sequence is
//! contiguous, and digests the serialized log. Two inspections of the
//! same journal always produce the same digest, which is how operators
//! check that a journal has not been altered between looks.

use serde::Serialize;
use tracing::instrument;

use crate::error::{Result, WorkflowError};
use crate::metrics::METRICS;
use verdant_state::{
    ContentDigest, JournalEvent, RunId, RunStatus, StorageError, WorkflowJournal,
};

/// What an inspection found about one run.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub run_id: String,
    pub workflow: String,
    pub status: RunStatus,
    pub event_count: u64,
    /// Digest of the serialized event log.
    pub replay_digest: ContentDigest,
    /// Digest of the run's input, as recorded at creation.
    pub input_digest: ContentDigest,
}

/// Load and verify a run's journal.
///
/// Fails when event sequence numbers are not the contiguous range
/// `1..=len`, which would mean the journal lost or duplicated an event.
#[instrument(skip(journal))]
pub async fn replay_inspect(
    journal: &dyn WorkflowJournal,
    run_id: &RunId,
) -> Result<(Vec<JournalEvent>, ReplaySummary)> {
    let record = journal.get_run(run_id).await?;
    let events = journal.get_events(run_id).await?;

    for (idx, event) in events.iter().enumerate() {
        let expected = idx as u64 + 1;
        if event.seq != expected {
            return Err(WorkflowError::Journal(StorageError::Backend(format!(
                "journal gap in run {run_id}: expected seq {expected}, found {}",
                event.seq
            ))));
        }
    }

    let replay_digest = ContentDigest::from_bytes(&serde_json::to_vec(&events)?);
    METRICS.inc_replays();

    let summary = ReplaySummary {
        run_id: run_id.to_string(),
        workflow: record.metadata.workflow.clone(),
        status: record.status,
        event_count: events.len() as u64,
        replay_digest,
        input_digest: record.input_digest,
    };
    Ok((events, summary))
}
