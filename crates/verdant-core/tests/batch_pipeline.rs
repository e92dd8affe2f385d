//! Batch gardening over a seeded repository listing.

use std::sync::Arc;
use std::time::Duration;

use verdant_core::activities::fakes::{FakeDocModel, FakeRepo, FakeRepoHost};
use verdant_core::{
    AccessToken, ActivityRegistry, BatchGardeningInput, BatchGardeningWorkflow, OutcomeStatus,
};
use verdant_state::fakes::{MemoryDraftStore, MemoryJournal};
use verdant_state::{RunStatus, WorkflowJournal};

fn setup() -> (Arc<MemoryJournal>, Arc<FakeRepoHost>, ActivityRegistry) {
    let journal = Arc::new(MemoryJournal::new());
    let host = Arc::new(FakeRepoHost::new());
    let registry = ActivityRegistry::new(
        host.clone(),
        Arc::new(FakeDocModel::new()),
        Arc::new(MemoryDraftStore::new()),
    );
    (journal, host, registry)
}

fn input(limit: usize) -> BatchGardeningInput {
    BatchGardeningInput {
        access_token: AccessToken::new("test-token"),
        limit,
    }
}

#[tokio::test]
async fn limit_bounds_the_batch_and_a_failure_is_isolated() {
    let (journal, host, registry) = setup();
    for i in 1..=5 {
        host.push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")));
    }
    host.fail_analysis("me/repo2");

    let batch_input = input(3);
    let workflow = BatchGardeningWorkflow::begin(journal, registry, &batch_input)
        .await
        .unwrap();
    let outcome = workflow.run(&batch_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.results.len(), 3);

    let failed: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.health_score == 0)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].repo_name, "me/repo2");
    assert_eq!(failed[0].issues, vec!["Analysis failed".to_string()]);

    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("me/repo2"));

    let status = workflow.status();
    assert_eq!(status.total, 3);
    assert_eq!(status.completed, 3);
}

#[tokio::test]
async fn every_child_failing_still_completes_the_batch() {
    let (journal, host, registry) = setup();
    for i in 1..=4 {
        let name = format!("me/repo{i}");
        host.push_repo(FakeRepo::healthy(i, &name));
        host.fail_analysis(&name);
    }

    let batch_input = input(4);
    let workflow = BatchGardeningWorkflow::begin(journal, registry, &batch_input)
        .await
        .unwrap();
    let outcome = workflow.run(&batch_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.results.len(), 4);
    assert!(outcome.results.iter().all(|r| r.health_score == 0));
    assert_eq!(outcome.errors.len(), 4);

    let status = workflow.status();
    assert_eq!(status.completed, status.total);
    assert_eq!(status.total, 4);
}

#[tokio::test]
async fn listing_failure_fails_the_whole_run() {
    let (journal, host, registry) = setup();
    host.push_repo(FakeRepo::healthy(1, "me/repo1"));
    host.fail_listings(1);

    let batch_input = input(3);
    let workflow = BatchGardeningWorkflow::begin(journal.clone(), registry, &batch_input)
        .await
        .unwrap();
    let outcome = workflow.run(&batch_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failure);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.errors.len(), 1);

    let record = journal.get_run(workflow.run_id()).await.unwrap();
    assert_eq!(record.status, RunStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn status_is_queryable_while_children_are_in_flight() {
    let (journal, host, registry) = setup();
    for i in 1..=3 {
        host.push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")));
    }
    let release = host.hold_analysis();

    let handle = BatchGardeningWorkflow::start(journal, registry, input(3))
        .await
        .unwrap();
    let reader = handle.status_reader();

    // The listing settles while every analysis is still held open.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = handle.status();
        if status.total == 3 {
            assert_eq!(status.completed, 0);
            assert!(status.results.is_empty());
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "listing never settled"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    release.send(true).unwrap();
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.results.len(), 3);
    let final_status = reader.get();
    assert_eq!(final_status.completed, 3);
    assert_eq!(final_status.results.len(), 3);
}

#[tokio::test]
async fn completed_count_never_lags_behind_results() {
    let (journal, host, registry) = setup();
    for i in 1..=6 {
        host.push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")));
    }

    let handle = BatchGardeningWorkflow::start(journal, registry, input(6))
        .await
        .unwrap();
    let reader = handle.status_reader();

    // Sample concurrently with the run: a snapshot must never show more
    // results than completions.
    let sampler = tokio::spawn(async move {
        for _ in 0..200 {
            let status = reader.get();
            assert!(status.results.len() == status.completed);
            assert!(status.completed <= status.total || status.total == 0);
            tokio::task::yield_now().await;
        }
    });

    let outcome = handle.join().await.unwrap();
    sampler.await.unwrap();
    assert_eq!(outcome.results.len(), 6);
}
