//! Deterministic top-project selection for the portfolio pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::repo::RepoMetadata;

/// Number of projects featured in a generated profile.
pub const TOP_PROJECT_COUNT: usize = 4;

/// A repository annotated with its health score, ready for ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionCandidate {
    pub full_name: String,
    pub health_score: u8,
    pub star_count: u32,
    pub last_push: Option<DateTime<Utc>>,
    pub fork: bool,
}

impl SelectionCandidate {
    /// Annotate repository metadata with a health score.
    pub fn from_metadata(meta: &RepoMetadata, health_score: u8) -> Self {
        Self {
            full_name: meta.full_name.clone(),
            health_score,
            star_count: meta.stargazers_count,
            last_push: meta.pushed_at,
            fork: meta.fork,
        }
    }
}

/// Pick the top projects from a candidate list.
///
/// Forks are excluded unconditionally. The remainder sort descending by
/// `(health_score, star_count, last_push)` with ties broken by the next
/// key in that fixed order; candidates with no push date rank below any
/// dated candidate at the same score and star count. At most
/// [`TOP_PROJECT_COUNT`] survive.
pub fn select_top_projects(candidates: &[SelectionCandidate]) -> Vec<SelectionCandidate> {
    let mut eligible: Vec<SelectionCandidate> =
        candidates.iter().filter(|c| !c.fork).cloned().collect();
    eligible.sort_by(|a, b| {
        b.health_score
            .cmp(&a.health_score)
            .then_with(|| b.star_count.cmp(&a.star_count))
            .then_with(|| b.last_push.cmp(&a.last_push))
    });
    eligible.truncate(TOP_PROJECT_COUNT);
    eligible
}

/// Everything the profile-generation activity needs about the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileContext {
    /// Account whose profile is being generated.
    pub username: String,

    /// Selected top projects, in rank order.
    pub selected: Vec<SelectionCandidate>,

    /// Repository counts per primary language across the whole account,
    /// forks excluded.
    pub language_counts: BTreeMap<String, usize>,
}

/// Count repositories per primary language, forks excluded.
pub fn language_counts(repos: &[RepoMetadata]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for repo in repos.iter().filter(|r| !r.fork) {
        if let Some(language) = &repo.language {
            *counts.entry(language.clone()).or_insert(0) += 1;
        }
    }
    counts
}
