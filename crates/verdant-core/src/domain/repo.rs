//! Repository descriptors as returned by the hosting provider.

use serde::{Deserialize, Serialize};

/// Minimal repository listing entry, enough to fan out health analyses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoSummary {
    /// Host-assigned numeric identifier.
    pub id: u64,

    /// Fully qualified name, e.g. `octocat/hello-world`.
    pub full_name: String,

    /// Free-text description, absent when the owner never set one.
    pub description: Option<String>,
}

/// Extended repository metadata used for portfolio ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoMetadata {
    /// Host-assigned numeric identifier.
    pub id: u64,

    /// Fully qualified name, e.g. `octocat/hello-world`.
    pub full_name: String,

    /// Free-text description, absent when the owner never set one.
    pub description: Option<String>,

    /// True when the repository is a fork of another repository.
    pub fork: bool,

    /// Star count at listing time.
    pub stargazers_count: u32,

    /// When the default branch last received a push. Absent for
    /// repositories the host has never seen a push on.
    pub pushed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Primary language as reported by the host.
    pub language: Option<String>,
}

impl RepoMetadata {
    /// Project this metadata down to a listing entry.
    pub fn summary(&self) -> RepoSummary {
        RepoSummary {
            id: self.id,
            full_name: self.full_name.clone(),
            description: self.description.clone(),
        }
    }
}
