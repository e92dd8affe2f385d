//! Human-approved draft commit.
//!
//! Committing is deliberately not a workflow: it is a short operation
//! triggered by a reviewer after inspecting a draft, so it calls the
//! PR activity directly instead of going through the journal. It stays
//! idempotent because the host reuses the existing branch and pull
//! request for repeated commits of the same repository.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::activities::{AccessToken, ActivityError, RepoHost, RepoKey};
use verdant_state::{DraftStore, StorageError};

/// What the reviewer approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub repo: RepoKey,

    /// Filenames to publish; must intersect the stored draft.
    pub selected_files: Vec<String>,

    pub access_token: AccessToken,
}

/// Proof of a published draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitReceipt {
    pub repo_id: u64,
    pub pr_url: String,
    pub committed_files: Vec<String>,
}

/// Why a commit was refused or failed.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The repository has no pending draft.
    #[error("no draft found for repository {repo_id}")]
    NoDraft { repo_id: u64 },

    /// The selection shares no filename with the stored draft. The
    /// draft is left untouched so a corrected selection can retry.
    #[error("no valid files selected for repository {repo_id}")]
    NoValidFilesSelected { repo_id: u64 },

    /// Opening the pull request failed.
    #[error(transparent)]
    Activity(#[from] ActivityError),

    /// The draft store rejected a read or write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Publish the approved subset of a repository's draft as a pull
/// request, then clear the draft.
///
/// Whichever subset was selected, a successful commit consumes the
/// whole draft: unselected files are discarded with it.
#[instrument(skip_all, fields(repo = %request.repo.full_name))]
pub async fn commit_draft(
    host: &dyn RepoHost,
    drafts: &dyn DraftStore,
    request: &CommitRequest,
) -> Result<CommitReceipt, CommitError> {
    let draft = drafts
        .load_draft(request.repo.id)
        .await?
        .ok_or(CommitError::NoDraft {
            repo_id: request.repo.id,
        })?;

    let files: BTreeMap<String, String> = draft
        .files
        .into_iter()
        .filter(|(name, _)| request.selected_files.iter().any(|s| s == name))
        .collect();
    if files.is_empty() {
        return Err(CommitError::NoValidFilesSelected {
            repo_id: request.repo.id,
        });
    }

    let pr_url = host
        .open_docs_pull_request(&request.repo.full_name, &files, &request.access_token)
        .await?;
    drafts.clear_draft(request.repo.id).await?;

    let committed_files: Vec<String> = files.into_keys().collect();
    info!(
        event = "draft.committed",
        repo = %request.repo.full_name,
        pr_url = %pr_url,
        files = committed_files.len(),
    );
    Ok(CommitReceipt {
        repo_id: request.repo.id,
        pr_url,
        committed_files,
    })
}
