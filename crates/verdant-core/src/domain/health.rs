//! Repository health scoring.
//!
//! A repository starts at a perfect score and loses fixed penalties for
//! each detected issue. Scoring is a pure function of the observed
//! signals and a caller-supplied reference time, so identical inputs
//! always produce identical scores and issue lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Penalty for a repository without a README.
pub const MISSING_README_PENALTY: i32 = 20;

/// Penalty for a repository whose last push is older than [`STALE_AFTER_DAYS`],
/// or that has no recorded push at all.
pub const STALE_PENALTY: i32 = 30;

/// Penalty for a repository without a description.
pub const MISSING_DESCRIPTION_PENALTY: i32 = 10;

/// Days without a push before a repository counts as stale (6 months of 30 days).
pub const STALE_AFTER_DAYS: i64 = 180;

/// Observable signals that feed the health score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthSignals {
    /// Whether a README exists at the repository root.
    pub has_readme: bool,

    /// Whether the repository has a non-empty description.
    pub has_description: bool,

    /// Timestamp of the most recent push, if the host reports one.
    pub last_push: Option<DateTime<Utc>>,
}

/// Score a repository's health from its signals.
///
/// Returns the score in `[0, 100]` together with the detected issues.
/// Each penalty is applied independently; the order of the issue list is
/// fixed (README, staleness, description) regardless of signal values.
pub fn score_health(signals: &HealthSignals, now: DateTime<Utc>) -> (u8, Vec<String>) {
    let mut score: i32 = 100;
    let mut issues = Vec::new();

    if !signals.has_readme {
        score -= MISSING_README_PENALTY;
        issues.push("No README".to_string());
    }

    match signals.last_push {
        Some(last_push) => {
            let days = (now - last_push).num_days();
            if days >= STALE_AFTER_DAYS {
                score -= STALE_PENALTY;
                issues.push(format!("Stale: last push {} months ago", days / 30));
            }
        }
        None => {
            score -= STALE_PENALTY;
            issues.push("No push date available".to_string());
        }
    }

    if !signals.has_description {
        score -= MISSING_DESCRIPTION_PENALTY;
        issues.push("No description".to_string());
    }

    (score.max(0) as u8, issues)
}

/// Health analysis outcome for a single repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoHealthResult {
    /// Fully qualified repository name.
    pub repo_name: String,

    /// Score in `[0, 100]`.
    pub health_score: u8,

    /// Human-readable issue descriptions, one per applied penalty.
    pub issues: Vec<String>,

    /// Most recent push, or the analysis time when the host reports none.
    pub last_commit_date: DateTime<Utc>,

    /// Link to an automatically opened fix, when the analyzer created one.
    pub pending_fix_url: Option<String>,
}

impl RepoHealthResult {
    /// Build a result by scoring the given signals.
    pub fn from_signals(
        repo_name: impl Into<String>,
        signals: &HealthSignals,
        now: DateTime<Utc>,
    ) -> Self {
        let (health_score, issues) = score_health(signals, now);
        Self {
            repo_name: repo_name.into(),
            health_score,
            issues,
            last_commit_date: signals.last_push.unwrap_or(now),
            pending_fix_url: None,
        }
    }

    /// Placeholder result recorded when the analysis activity itself failed.
    pub fn analysis_failed(repo_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            repo_name: repo_name.into(),
            health_score: 0,
            issues: vec!["Analysis failed".to_string()],
            last_commit_date: now,
            pending_fix_url: None,
        }
    }
}
