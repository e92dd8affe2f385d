//! Journal trait definitions for Verdant
//!
//! These traits define the persistence abstractions behind durable
//! workflow execution:
//! - `WorkflowJournal`: append-only event journal per run, replayable
//! - `DraftStore`: pending doc-draft proposals awaiting human review
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Digest of a value's canonical JSON serialization.
    pub fn from_json<T: Serialize>(value: &T) -> StorageResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WorkflowJournal — durable run persistence
// ---------------------------------------------------------------------------

/// Unique identifier for a workflow run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata attached to a run at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Workflow kind (e.g. "analysis", "batch_gardening", "janitor")
    pub workflow: String,
    /// Primary subject of the run, usually a repo full name or username
    pub subject: Option<String>,
    /// Serialized workflow input; sufficient to resume the run
    pub tags: serde_json::Value,
}

/// A single journaled event within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Monotonic sequence number within the run
    pub seq: u64,
    /// Event kind (e.g. "stage_entered", "step_completed", "step_failed")
    pub kind: String,
    /// Event payload
    pub payload: serde_json::Value,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

/// Summary produced when a run reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total events recorded
    pub total_events: u64,
    /// Digest of the serialized terminal outcome (if any)
    pub outcome_digest: Option<ContentDigest>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Whether the run succeeded
    pub success: bool,
}

/// Status of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Full run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub input_digest: ContentDigest,
    pub metadata: RunMetadata,
    pub status: RunStatus,
    pub summary: Option<RunSummary>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only workflow journal.
///
/// Guarantees:
/// - Events are ordered by monotonic `seq` within a run.
/// - A run transitions: Running → Completed | Failed | Cancelled (terminal).
/// - Terminal runs are immutable; appends to them are rejected.
/// - A run's events plus its metadata are sufficient to replay it.
#[async_trait]
pub trait WorkflowJournal: Send + Sync {
    /// Create a new run, returning its unique ID.
    async fn create_run(
        &self,
        input_digest: &ContentDigest,
        metadata: RunMetadata,
    ) -> StorageResult<RunId>;

    /// Append an event to an active run. Fails if the run is terminal.
    async fn append_event(&self, run_id: &RunId, event: JournalEvent) -> StorageResult<()>;

    /// Mark a run as completed with a summary.
    async fn complete_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()>;

    /// Mark a run as failed with a summary.
    async fn fail_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()>;

    /// Mark a run as cancelled.
    async fn cancel_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()>;

    /// Retrieve a run record by ID.
    async fn get_run(&self, run_id: &RunId) -> StorageResult<RunRecord>;

    /// Retrieve all events for a run, ordered by seq.
    async fn get_events(&self, run_id: &RunId) -> StorageResult<Vec<JournalEvent>>;

    /// List runs, optionally filtered by workflow kind.
    async fn list_runs(&self, workflow: Option<&str>) -> StorageResult<Vec<RunRecord>>;
}

// ---------------------------------------------------------------------------
// DraftStore — pending doc-draft proposals
// ---------------------------------------------------------------------------

/// A pending draft proposal: generated docs awaiting human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    /// Repository the draft belongs to
    pub repo_id: u64,
    /// Filename → generated content
    pub files: BTreeMap<String, String>,
    /// When this draft was last written
    pub updated_at: DateTime<Utc>,
}

/// Draft proposal store.
///
/// Semantics:
/// - At most one draft exists per repository.
/// - `save_draft` replaces the whole draft (last writer wins); readers
///   never observe a partially written draft.
/// - `clear_draft` removes the draft entirely; no-op if absent.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Write the draft for a repository, replacing any prior draft.
    async fn save_draft(
        &self,
        repo_id: u64,
        files: BTreeMap<String, String>,
    ) -> StorageResult<()>;

    /// Fetch the current draft for a repository, if any.
    async fn load_draft(&self, repo_id: u64) -> StorageResult<Option<DraftRecord>>;

    /// Remove the draft for a repository. No-op if absent.
    async fn clear_draft(&self, repo_id: u64) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_from_bytes_is_deterministic() {
        let a = ContentDigest::from_bytes(b"hello");
        let b = ContentDigest::from_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn digest_from_json_matches_serialized_bytes() {
        let value = serde_json::json!({"workflow": "janitor", "repo": 7});
        let via_json = ContentDigest::from_json(&value).unwrap();
        let via_bytes = ContentDigest::from_bytes(&serde_json::to_vec(&value).unwrap());
        assert_eq!(via_json, via_bytes);
    }

    #[test]
    fn digest_try_from_rejects_bad_input() {
        assert!(ContentDigest::try_from("zzz".to_string()).is_err());
        assert!(ContentDigest::try_from("g".repeat(64)).is_err());

        let valid = "a".repeat(64);
        let digest = ContentDigest::try_from(valid.clone()).unwrap();
        assert_eq!(digest.as_str(), valid);
    }

    #[test]
    fn digest_try_from_lowercases() {
        let upper = "ABCDEF0123456789".repeat(4);
        let digest = ContentDigest::try_from(upper).unwrap();
        assert_eq!(digest.as_str(), "abcdef0123456789".repeat(4));
    }

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
