//! Progress snapshots and terminal outcomes for the pipeline workflows.
//!
//! Status types are the queryable, mid-flight view of a running
//! procedure; outcome types are what the procedure returns once it
//! settles. Both serialize, so they can be journaled and exposed over
//! whatever query surface the caller provides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::health::RepoHealthResult;

/// Terminal classification of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The run completed and produced its full result.
    Success,

    /// The run could not produce a usable result.
    Failure,

    /// All documents generated; a draft awaits human review.
    ReviewReady,

    /// Some documents generated; a partial draft awaits human review.
    PartialReviewReady,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Failure => "failure",
            OutcomeStatus::ReviewReady => "review_ready",
            OutcomeStatus::PartialReviewReady => "partial_review_ready",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Batch gardening
// ---------------------------------------------------------------------------

/// Live progress of a batch gardening run.
///
/// `completed` only ever grows, and equals `total` once the run settles,
/// however many analyses failed along the way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchStatus {
    /// Number of repositories in the batch.
    pub total: usize,

    /// Number of analyses that have settled, successfully or not.
    pub completed: usize,

    /// Results in completion order, not input order.
    pub results: Vec<RepoHealthResult>,
}

/// Terminal result of a batch gardening run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOutcome {
    pub status: OutcomeStatus,

    /// Results in completion order; failed analyses appear as synthesized
    /// zero-score records rather than being dropped.
    pub results: Vec<RepoHealthResult>,

    /// One note per failed analysis.
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Janitor
// ---------------------------------------------------------------------------

/// Stages of the per-repository documentation pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JanitorStage {
    Scanning,
    Analyzing,
    Generating,
    Aggregating,
    ReviewReady,
    PartialReviewReady,
    Failure,
}

impl std::fmt::Display for JanitorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JanitorStage::Scanning => "scanning",
            JanitorStage::Analyzing => "analyzing",
            JanitorStage::Generating => "generating",
            JanitorStage::Aggregating => "aggregating",
            JanitorStage::ReviewReady => "review_ready",
            JanitorStage::PartialReviewReady => "partial_review_ready",
            JanitorStage::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Live progress of a janitor run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JanitorStatus {
    /// Current pipeline stage.
    pub stage: JanitorStage,

    /// Filenames generated so far.
    pub generated: Vec<String>,

    /// Errors keyed by document label, or by activity name for
    /// pipeline-fatal failures.
    pub errors: BTreeMap<String, String>,
}

impl Default for JanitorStatus {
    fn default() -> Self {
        Self {
            stage: JanitorStage::Scanning,
            generated: Vec::new(),
            errors: BTreeMap::new(),
        }
    }
}

/// Terminal result of a janitor run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JanitorOutcome {
    pub status: OutcomeStatus,

    /// Filenames written into the draft proposal.
    pub files: Vec<String>,

    /// Errors keyed by document label, or by activity name for
    /// pipeline-fatal failures.
    pub errors: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// Stages of the account-wide portfolio pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioStage {
    Starting,
    Scanning,
    Analyzing,
    Selecting,
    Generating,
    Publishing,
    Complete,
    Failed,
}

impl std::fmt::Display for PortfolioStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PortfolioStage::Starting => "starting",
            PortfolioStage::Scanning => "scanning",
            PortfolioStage::Analyzing => "analyzing",
            PortfolioStage::Selecting => "selecting",
            PortfolioStage::Generating => "generating",
            PortfolioStage::Publishing => "publishing",
            PortfolioStage::Complete => "complete",
            PortfolioStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Live progress of a portfolio run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortfolioStatus {
    /// Current pipeline stage.
    pub stage: PortfolioStage,

    /// Number of repositories fetched for analysis.
    pub total_repos: usize,

    /// Number of repositories whose analysis has settled. Grows
    /// monotonically and equals `total_repos` after the analyzing stage.
    pub analyzed: usize,

    /// Full names of the selected top repositories.
    pub top_repos: Vec<String>,

    /// URL of the published profile, once publishing succeeds.
    pub profile_url: Option<String>,

    /// URL of the opened pull request, when publishing created one.
    pub pr_url: Option<String>,

    /// Non-fatal error notes accumulated across stages.
    pub errors: Vec<String>,
}

impl Default for PortfolioStatus {
    fn default() -> Self {
        Self {
            stage: PortfolioStage::Starting,
            total_repos: 0,
            analyzed: 0,
            top_repos: Vec::new(),
            profile_url: None,
            pr_url: None,
            errors: Vec::new(),
        }
    }
}

/// Terminal result of a portfolio run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortfolioOutcome {
    pub status: OutcomeStatus,
    pub top_repos: Vec<String>,
    pub profile_url: Option<String>,
    pub pr_url: Option<String>,
    pub errors: Vec<String>,
}
