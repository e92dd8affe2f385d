//! Portfolio pipeline: analyze the account, select, publish.

use std::sync::Arc;

use chrono::Utc;

use verdant_core::activities::fakes::{FakeDocModel, FakeRepo, FakeRepoHost};
use verdant_core::{
    AccessToken, ActivityRegistry, OutcomeStatus, PortfolioInput, PortfolioStage,
    PortfolioWorkflow,
};
use verdant_state::fakes::{MemoryDraftStore, MemoryJournal};
use verdant_state::{RunStatus, WorkflowJournal};

struct Fixture {
    journal: Arc<MemoryJournal>,
    host: Arc<FakeRepoHost>,
    model: Arc<FakeDocModel>,
    registry: ActivityRegistry,
}

fn setup() -> Fixture {
    let journal = Arc::new(MemoryJournal::new());
    let host = Arc::new(FakeRepoHost::new());
    let model = Arc::new(FakeDocModel::new());
    let registry = ActivityRegistry::new(
        host.clone(),
        model.clone(),
        Arc::new(MemoryDraftStore::new()),
    );
    Fixture {
        journal,
        host,
        model,
        registry,
    }
}

fn input() -> PortfolioInput {
    PortfolioInput {
        username: "me".to_string(),
        access_token: AccessToken::new("test-token"),
    }
}

/// Pin the push timestamp so ranking assertions don't depend on
/// construction order.
fn pushed_days_ago(mut repo: FakeRepo, days: i64) -> FakeRepo {
    let ts = Some(Utc::now() - chrono::Duration::days(days));
    repo.meta.pushed_at = ts;
    repo.signals.last_push = ts;
    repo
}

#[tokio::test]
async fn happy_path_publishes_the_top_four() {
    let fx = setup();
    for (i, stars) in [10u32, 50, 30, 20, 40].into_iter().enumerate() {
        let id = i as u64 + 1;
        fx.host
            .push_repo(FakeRepo::healthy(id, &format!("me/repo{id}")).with_stars(stars));
    }

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal.clone(), fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    // All score 100, so stars decide; repo1 at 10 stars misses the cut.
    assert_eq!(
        outcome.top_repos,
        vec!["me/repo2", "me/repo5", "me/repo3", "me/repo4"]
    );
    assert_eq!(
        outcome.profile_url.as_deref(),
        Some("https://example.com/me/me")
    );
    assert_eq!(
        outcome.pr_url.as_deref(),
        Some("https://example.com/me/me/pull/1")
    );
    assert!(outcome.errors.is_empty());

    let status = workflow.status();
    assert_eq!(status.stage, PortfolioStage::Complete);
    assert_eq!(status.total_repos, 5);
    assert_eq!(status.analyzed, 5);

    let (username, content) = fx.host.published_profile().unwrap();
    assert_eq!(username, "me");
    assert!(content.contains("me/repo2"));

    let record = fx.journal.get_run(workflow.run_id()).await.unwrap();
    assert_eq!(record.status, RunStatus::Completed);
}

#[tokio::test]
async fn ranking_ignores_forks_and_breaks_ties_in_order() {
    let fx = setup();
    fx.host
        .push_repo(pushed_days_ago(FakeRepo::healthy(1, "me/b").with_stars(50), 5));
    fx.host
        .push_repo(pushed_days_ago(FakeRepo::healthy(2, "me/a").with_stars(10), 2));
    fx.host
        .push_repo(pushed_days_ago(FakeRepo::healthy(3, "me/e").with_stars(10), 5));
    fx.host.push_repo(pushed_days_ago(
        FakeRepo::healthy(4, "me/c").with_stars(999).without_readme(),
        5,
    ));
    fx.host
        .push_repo(FakeRepo::healthy(5, "me/fork").with_stars(10_000).as_fork());

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal, fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    // Health first, then stars, then recency; the fork never competes
    // whatever its stars.
    assert_eq!(outcome.top_repos, vec!["me/b", "me/a", "me/e", "me/c"]);
}

#[tokio::test(start_paused = true)]
async fn failed_analysis_zero_scores_without_stopping_the_run() {
    let fx = setup();
    for i in 1..=4 {
        fx.host
            .push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")).with_stars(i as u32 * 10));
    }
    fx.host.push_repo(FakeRepo::healthy(5, "me/broken"));
    fx.host.fail_analysis("me/broken");

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal, fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("me/broken"));

    // The zero-scored candidate ranks below the four healthy ones.
    assert_eq!(outcome.top_repos.len(), 4);
    assert!(!outcome.top_repos.contains(&"me/broken".to_string()));

    let status = workflow.status();
    assert_eq!(status.analyzed, 5);
    assert_eq!(status.total_repos, 5);
    // Four single-attempt analyses plus two attempts for the broken one.
    assert_eq!(fx.host.analyze_calls(), 6);
}

#[tokio::test]
async fn an_account_of_forks_has_no_eligible_repositories() {
    let fx = setup();
    for i in 1..=3 {
        fx.host
            .push_repo(FakeRepo::healthy(i, &format!("me/fork{i}")).as_fork());
    }

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal.clone(), fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failure);
    assert!(outcome.top_repos.is_empty());
    assert_eq!(outcome.profile_url, None);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("no eligible repositories")));

    // Selection failed before any generation or publication.
    assert_eq!(fx.model.profile_calls(), 0);
    assert_eq!(fx.host.publish_calls(), 0);
    assert_eq!(workflow.status().stage, PortfolioStage::Failed);

    let record = fx.journal.get_run(workflow.run_id()).await.unwrap();
    assert_eq!(record.status, RunStatus::Failed);
}

#[tokio::test]
async fn analyses_run_in_groups_until_every_repo_is_covered() {
    let fx = setup();
    for i in 1..=7 {
        fx.host
            .push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")).with_stars(i as u32));
    }

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal, fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(workflow.status().analyzed, 7);
    assert_eq!(fx.host.analyze_calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn a_flaky_analysis_recovers_on_retry() {
    let fx = setup();
    for i in 1..=3 {
        fx.host
            .push_repo(FakeRepo::healthy(i, &format!("me/repo{i}")).with_stars(i as u32 * 10));
    }
    fx.host.fail_analysis_times("me/repo2", 1);

    let portfolio_input = input();
    let workflow = PortfolioWorkflow::begin(fx.journal, fx.registry, &portfolio_input)
        .await
        .unwrap();
    let outcome = workflow.run(&portfolio_input).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(outcome.errors.is_empty());
    assert!(outcome.top_repos.contains(&"me/repo2".to_string()));
    assert_eq!(fx.host.analyze_calls(), 4);
}
