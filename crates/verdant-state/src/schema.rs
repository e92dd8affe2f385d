//! Schema definitions for Verdant SurrealDB tables
//!
//! Tables:
//! - workflow_runs: One row per workflow run (metadata + terminal summary)
//! - workflow_events: Append-only journal events, unique per (run_id, seq)
//! - draft_proposals: Pending doc drafts, at most one per repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

// ---------------------------------------------------------------------------
// workflow_runs rows
// ---------------------------------------------------------------------------

/// Run row - workflow run metadata and terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    /// SurrealDB record ID
    pub id: Option<surrealdb::sql::Thing>,
    /// Unique run ID (UUID string)
    pub run_id: String,
    /// Digest of the serialized workflow input (SHA256)
    pub input_digest: String,
    /// Workflow kind (e.g. "janitor", "portfolio")
    pub workflow: String,
    /// Primary subject of the run (repo full name, username)
    pub subject: Option<String>,
    /// Serialized workflow input (JSON)
    pub tags: serde_json::Value,
    /// Run status: "running" | "completed" | "failed" | "cancelled"
    pub status: String,
    /// Total events recorded
    pub total_events: u64,
    /// Digest of the terminal outcome (if any)
    pub outcome_digest: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Whether run succeeded
    pub success: bool,
    /// Created timestamp
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    /// Completed timestamp (if terminal)
    #[serde(default, with = "surreal_datetime_opt")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunRow {
    /// Create a new run row in "running" state
    pub fn new(
        run_id: String,
        input_digest: String,
        workflow: String,
        subject: Option<String>,
        tags: serde_json::Value,
    ) -> Self {
        RunRow {
            id: None,
            run_id,
            input_digest,
            workflow,
            subject,
            tags,
            status: "running".to_string(),
            total_events: 0,
            outcome_digest: None,
            duration_ms: 0,
            success: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark run as completed
    pub fn complete(
        mut self,
        total_events: u64,
        outcome_digest: Option<String>,
        duration_ms: u64,
        success: bool,
    ) -> Self {
        self.status = "completed".to_string();
        self.total_events = total_events;
        self.outcome_digest = outcome_digest;
        self.duration_ms = duration_ms;
        self.success = success;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Mark run as failed
    pub fn fail(mut self, total_events: u64, outcome_digest: Option<String>, duration_ms: u64) -> Self {
        self.status = "failed".to_string();
        self.total_events = total_events;
        self.outcome_digest = outcome_digest;
        self.duration_ms = duration_ms;
        self.success = false;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Mark run as cancelled
    pub fn cancel(mut self, total_events: u64, duration_ms: u64) -> Self {
        self.status = "cancelled".to_string();
        self.total_events = total_events;
        self.duration_ms = duration_ms;
        self.success = false;
        self.completed_at = Some(Utc::now());
        self
    }
}

// ---------------------------------------------------------------------------
// workflow_events rows
// ---------------------------------------------------------------------------

/// Event row - single journaled event within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    /// SurrealDB record ID
    pub id: Option<surrealdb::sql::Thing>,
    /// Run ID this event belongs to
    pub run_id: String,
    /// Monotonic sequence number within run (1-indexed)
    pub seq: u64,
    /// Event kind (e.g. "stage_entered", "step_completed")
    pub kind: String,
    /// Event payload (JSON)
    pub payload: serde_json::Value,
    /// Event timestamp
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl EventRow {
    /// Create a new event row
    pub fn new(run_id: String, seq: u64, kind: String, payload: serde_json::Value) -> Self {
        EventRow {
            id: None,
            run_id,
            seq,
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// draft_proposals rows
// ---------------------------------------------------------------------------

/// Draft row - pending doc draft for one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRow {
    /// SurrealDB record ID
    pub id: Option<surrealdb::sql::Thing>,
    /// Repository the draft belongs to
    pub repo_id: u64,
    /// Filename → generated content
    pub files: BTreeMap<String, String>,
    /// When this draft was last written
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl DraftRow {
    /// Create a new draft row
    pub fn new(repo_id: u64, files: BTreeMap<String, String>) -> Self {
        DraftRow {
            id: None,
            repo_id,
            files,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_row_lifecycle_builders() {
        let row = RunRow::new(
            "r1".to_string(),
            "d".repeat(64),
            "janitor".to_string(),
            Some("acme/site".to_string()),
            serde_json::json!({}),
        );
        assert_eq!(row.status, "running");
        assert!(!row.success);
        assert!(row.completed_at.is_none());

        let done = row.clone().complete(5, None, 120, true);
        assert_eq!(done.status, "completed");
        assert!(done.success);
        assert!(done.completed_at.is_some());

        let failed = row.fail(3, None, 80);
        assert_eq!(failed.status, "failed");
        assert!(!failed.success);
    }
}
