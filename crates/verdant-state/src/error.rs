use thiserror::Error;

/// Errors surfaced by the journal and draft store backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    #[error("Invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    #[error("No draft proposal for repo {repo_id}")]
    DraftNotFound { repo_id: u64 },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = StorageError::RunNotFound {
            run_id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Run not found: abc");

        let err = StorageError::InvalidRunState {
            run_id: "abc".to_string(),
            status: "completed".to_string(),
            expected: "running".to_string(),
        };
        assert_eq!(err.to_string(), "Run abc is completed, expected running");

        let err = StorageError::DraftNotFound { repo_id: 42 };
        assert_eq!(err.to_string(), "No draft proposal for repo 42");
    }
}
