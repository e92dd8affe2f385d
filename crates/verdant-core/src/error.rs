//! Error types for workflow orchestration.

use thiserror::Error;

use crate::activities::ActivityError;
use verdant_state::StorageError;

/// Errors surfaced by workflow execution and replay.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An activity failed after its retry policy was exhausted.
    #[error(transparent)]
    Activity(#[from] ActivityError),

    /// The journal rejected a read or write.
    #[error(transparent)]
    Journal(#[from] StorageError),

    /// A journaled payload could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A run was resumed under a different workflow kind than it was started with.
    #[error("run {run_id} belongs to workflow '{actual}', expected '{expected}'")]
    WrongWorkflowKind {
        run_id: String,
        expected: String,
        actual: String,
    },

    /// A spawned workflow task panicked or was aborted.
    #[error("workflow task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_workflow_kind_message() {
        let err = WorkflowError::WrongWorkflowKind {
            run_id: "abc".to_string(),
            expected: "janitor".to_string(),
            actual: "portfolio".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "run abc belongs to workflow 'portfolio', expected 'janitor'"
        );
    }

    #[test]
    fn test_activity_error_is_transparent() {
        let err = WorkflowError::Activity(ActivityError::Remote {
            activity: "deep_scan".to_string(),
            message: "rate limited".to_string(),
        });
        assert!(err.to_string().contains("deep_scan"));
        assert!(err.to_string().contains("rate limited"));
    }
}
