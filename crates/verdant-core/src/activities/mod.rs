//! Activity contracts: the side-effecting boundary of every workflow.
//!
//! Each trait method is one remote operation with a typed request and
//! response. Workflows call these through the retry/timeout wrapper in
//! [`crate::runtime`]; implementations live outside this crate (hosting
//! provider clients, model clients), with scripted fakes in
//! [`fakes`] for tests.

pub mod fakes;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    CodebaseSummary, DocKind, ProfileContext, RepoHealthResult, RepoMetadata, RepoSummary,
    ScanResult,
};
use verdant_state::DraftStore;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Hosting-provider credential.
///
/// Serializes transparently (workflow inputs carry it into the journal)
/// but never prints its value: both `Debug` and `Display` redact.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw credential, for handing to an HTTP client.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("****")
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// Identifies one repository to the hosting provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoKey {
    /// Host-assigned numeric identifier.
    pub id: u64,

    /// Fully qualified name, e.g. `octocat/hello-world`.
    pub full_name: String,
}

/// Result of publishing a profile document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfilePublication {
    /// URL of the profile repository or page.
    pub profile_url: String,

    /// URL of the opened pull request, when publishing went through one.
    pub pr_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single activity invocation or of its whole retry budget.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// One attempt exceeded its deadline.
    #[error("activity '{activity}' timed out after {timeout_ms}ms")]
    Timeout { activity: String, timeout_ms: u64 },

    /// The remote collaborator reported a failure.
    #[error("activity '{activity}' failed: {message}")]
    Remote { activity: String, message: String },

    /// Every attempt allowed by the retry policy failed.
    #[error("activity '{activity}' exhausted {attempts} attempts")]
    Exhausted {
        activity: String,
        attempts: u32,
        #[source]
        source: Box<ActivityError>,
    },
}

impl ActivityError {
    /// Name of the activity this error belongs to.
    pub fn activity(&self) -> &str {
        match self {
            ActivityError::Timeout { activity, .. } => activity,
            ActivityError::Remote { activity, .. } => activity,
            ActivityError::Exhausted { activity, .. } => activity,
        }
    }
}

/// Convenience alias for activity return types.
pub type ActivityResult<T> = Result<T, ActivityError>;

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Operations against the repository hosting provider.
///
/// Guarantees required of implementations:
/// - Calls are independently retryable: repeating a failed call must be
///   safe, including `open_docs_pull_request` (branch/PR reuse, never a
///   duplicate PR for identical content).
/// - Returned trees are already normalised (hidden entries dropped,
///   directories first, case-insensitive order).
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Score one repository's health. May persist a health record host-side.
    async fn analyze_health(
        &self,
        repo_full_name: &str,
        token: &AccessToken,
    ) -> ActivityResult<RepoHealthResult>;

    /// List repositories visible to the credential, newest first.
    async fn list_repos(
        &self,
        token: &AccessToken,
        limit: usize,
    ) -> ActivityResult<Vec<RepoSummary>>;

    /// List all repositories with fork/star/push metadata.
    async fn list_repos_extended(&self, token: &AccessToken)
        -> ActivityResult<Vec<RepoMetadata>>;

    /// Clone and map one repository, persisting a structure snapshot.
    async fn deep_scan(&self, repo: &RepoKey, token: &AccessToken) -> ActivityResult<ScanResult>;

    /// Open or update a docs pull request carrying the given files.
    /// Returns the pull request URL.
    async fn open_docs_pull_request(
        &self,
        repo_full_name: &str,
        files: &BTreeMap<String, String>,
        token: &AccessToken,
    ) -> ActivityResult<String>;

    /// Create or update the account's profile repository with the given
    /// document, opening a pull request where the host supports it.
    async fn publish_profile(
        &self,
        username: &str,
        content: &str,
        token: &AccessToken,
    ) -> ActivityResult<ProfilePublication>;
}

/// Operations against the language-model provider.
#[async_trait]
pub trait DocModel: Send + Sync {
    /// Distill a scanned repository into an opaque summary.
    async fn summarize_codebase(
        &self,
        repo_name: &str,
        description: Option<&str>,
        scan: &ScanResult,
    ) -> ActivityResult<CodebaseSummary>;

    /// Generate one document of the given kind.
    async fn generate_document(
        &self,
        kind: DocKind,
        repo_name: &str,
        summary: &CodebaseSummary,
        scan: &ScanResult,
    ) -> ActivityResult<String>;

    /// Generate an account profile document from the selected projects.
    async fn generate_profile(
        &self,
        username: &str,
        context: &ProfileContext,
    ) -> ActivityResult<String>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The closed set of collaborators a workflow can reach.
///
/// Assembled once at process start and cloned into each workflow; no
/// stringly-typed dispatch, every operation is a typed trait method.
#[derive(Clone)]
pub struct ActivityRegistry {
    pub host: Arc<dyn RepoHost>,
    pub model: Arc<dyn DocModel>,
    pub drafts: Arc<dyn DraftStore>,
}

impl ActivityRegistry {
    pub fn new(
        host: Arc<dyn RepoHost>,
        model: Arc<dyn DocModel>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            host,
            model,
            drafts,
        }
    }
}
