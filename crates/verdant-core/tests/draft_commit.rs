//! Review-gated publication of drafted documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use verdant_core::activities::fakes::{FakeDocModel, FakeRepoHost};
use verdant_core::{
    commit_draft, AccessToken, ActivityRegistry, CommitError, CommitRequest, JanitorInput,
    JanitorWorkflow, OutcomeStatus, RepoKey,
};
use verdant_state::fakes::{MemoryDraftStore, MemoryJournal};
use verdant_state::DraftStore;

fn seeded_files() -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    files.insert("README.md".to_string(), "# Project\n".to_string());
    files.insert("ARCHITECTURE.md".to_string(), "# Architecture\n".to_string());
    files.insert("CONTRIBUTING.md".to_string(), "# Contributing\n".to_string());
    files
}

fn request(selected: &[&str]) -> CommitRequest {
    CommitRequest {
        repo: RepoKey {
            id: 7,
            full_name: "me/project".to_string(),
        },
        selected_files: selected.iter().map(|s| s.to_string()).collect(),
        access_token: AccessToken::new("test-token"),
    }
}

#[tokio::test]
async fn committing_everything_opens_a_pr_and_clears_the_draft() {
    let host = FakeRepoHost::new();
    let drafts = MemoryDraftStore::new();
    drafts.save_draft(7, seeded_files()).await.unwrap();

    let receipt = commit_draft(
        &host,
        &drafts,
        &request(&["README.md", "ARCHITECTURE.md", "CONTRIBUTING.md"]),
    )
    .await
    .unwrap();

    assert_eq!(receipt.repo_id, 7);
    assert_eq!(receipt.pr_url, "https://example.com/me/project/pull/1");
    assert_eq!(
        receipt.committed_files,
        vec!["ARCHITECTURE.md", "CONTRIBUTING.md", "README.md"]
    );

    let pr = host.pull_request("me/project").unwrap();
    assert_eq!(pr.files.len(), 3);
    assert!(drafts.load_draft(7).await.unwrap().is_none());
}

#[tokio::test]
async fn a_partial_selection_publishes_less_but_still_clears_everything() {
    let host = FakeRepoHost::new();
    let drafts = MemoryDraftStore::new();
    drafts.save_draft(7, seeded_files()).await.unwrap();

    let receipt = commit_draft(&host, &drafts, &request(&["README.md"]))
        .await
        .unwrap();

    assert_eq!(receipt.committed_files, vec!["README.md"]);
    let pr = host.pull_request("me/project").unwrap();
    assert_eq!(pr.files.len(), 1);
    assert!(pr.files.contains_key("README.md"));

    // Declining the rest of the proposal still retires it.
    assert!(drafts.load_draft(7).await.unwrap().is_none());
}

#[tokio::test]
async fn a_selection_matching_nothing_keeps_the_draft() {
    let host = FakeRepoHost::new();
    let drafts = MemoryDraftStore::new();
    drafts.save_draft(7, seeded_files()).await.unwrap();

    let err = commit_draft(&host, &drafts, &request(&["NOTES.md"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommitError::NoValidFilesSelected { repo_id: 7 }
    ));

    let err = commit_draft(&host, &drafts, &request(&[])).await.unwrap_err();
    assert!(matches!(err, CommitError::NoValidFilesSelected { .. }));

    // The uncommitted proposal survives for a corrected selection.
    let draft = drafts.load_draft(7).await.unwrap().unwrap();
    assert_eq!(draft.files.len(), 3);
    assert_eq!(host.created_pr_count(), 0);
}

#[tokio::test]
async fn a_committed_draft_cannot_commit_twice() {
    let host = FakeRepoHost::new();
    let drafts = MemoryDraftStore::new();
    drafts.save_draft(7, seeded_files()).await.unwrap();

    commit_draft(&host, &drafts, &request(&["README.md"]))
        .await
        .unwrap();
    let err = commit_draft(&host, &drafts, &request(&["README.md"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::NoDraft { repo_id: 7 }));
}

#[tokio::test]
async fn repeated_review_cycles_reuse_one_pull_request() {
    let host = FakeRepoHost::new();
    let drafts = MemoryDraftStore::new();

    drafts.save_draft(7, seeded_files()).await.unwrap();
    let first = commit_draft(&host, &drafts, &request(&["README.md"]))
        .await
        .unwrap();

    // A later pipeline run proposes again; committing updates the same PR.
    drafts.save_draft(7, seeded_files()).await.unwrap();
    let second = commit_draft(&host, &drafts, &request(&["ARCHITECTURE.md"]))
        .await
        .unwrap();

    assert_eq!(first.pr_url, second.pr_url);
    assert_eq!(host.created_pr_count(), 1);
    assert_eq!(host.pull_request("me/project").unwrap().updates, 1);
}

#[tokio::test]
async fn pipeline_draft_flows_through_review_to_publication() {
    let journal = Arc::new(MemoryJournal::new());
    let host = Arc::new(FakeRepoHost::new());
    let drafts = Arc::new(MemoryDraftStore::new());
    let registry = ActivityRegistry::new(host.clone(), Arc::new(FakeDocModel::new()), drafts.clone());

    let input = JanitorInput {
        repo: RepoKey {
            id: 7,
            full_name: "me/project".to_string(),
        },
        description: Some("A project".to_string()),
        access_token: AccessToken::new("test-token"),
    };
    let workflow = JanitorWorkflow::begin(journal, registry, &input)
        .await
        .unwrap();
    let outcome = workflow.run(&input).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::ReviewReady);

    // Human review approves the full proposal.
    let receipt = commit_draft(
        host.as_ref(),
        drafts.as_ref(),
        &request(&["README.md", "ARCHITECTURE.md", "CONTRIBUTING.md"]),
    )
    .await
    .unwrap();

    assert_eq!(receipt.committed_files.len(), 3);
    let pr = host.pull_request("me/project").unwrap();
    assert!(pr.files["README.md"].contains("me/project"));
    assert!(drafts.load_draft(7).await.unwrap().is_none());
}
