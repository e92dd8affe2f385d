//! Account-wide portfolio pipeline.
//!
//! Stage walk: `starting → scanning → analyzing → selecting →
//! generating → publishing → complete`, or `failed`. Health analyses
//! run in fixed-size groups; selection is the deterministic ranking in
//! [`crate::domain::selection`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::activities::{
    AccessToken, ActivityError, ActivityRegistry, ProfilePublication,
};
use crate::domain::{
    language_counts, select_top_projects, OutcomeStatus, PortfolioOutcome, PortfolioStage,
    PortfolioStatus, ProfileContext, RepoMetadata, SelectionCandidate,
};
use crate::error::{Result, WorkflowError};
use crate::obs::WorkflowSpan;
use crate::runtime::{invoke, ActivityOptions, StatusCell, StatusReader, WorkflowCtx};
use crate::workflows::handle::WorkflowHandle;
use verdant_state::{RunId, WorkflowJournal};

/// Workflow kind recorded in the journal.
pub const WORKFLOW_KIND: &str = "portfolio";

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);
const ANALYZE_ATTEMPTS: u32 = 2;
const ANALYZE_BACKOFF: Duration = Duration::from_secs(3);
/// Health analyses run in groups of this size.
const ANALYZE_BATCH_SIZE: usize = 5;
const PROFILE_TIMEOUT: Duration = Duration::from_secs(120);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_ATTEMPTS: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Input to [`PortfolioWorkflow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub username: String,
    pub access_token: AccessToken,
}

/// Journaled outcome of one repository's analysis: the ranked candidate,
/// zero-scored with an error note when the analysis failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CandidateAnalysis {
    candidate: SelectionCandidate,
    error: Option<String>,
}

/// Analyzes every repository of an account, selects the top projects,
/// generates a profile document, and publishes it.
pub struct PortfolioWorkflow {
    registry: ActivityRegistry,
    ctx: WorkflowCtx,
    status: StatusCell<PortfolioStatus>,
}

impl PortfolioWorkflow {
    /// Create a fresh journaled run.
    pub async fn begin(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        input: &PortfolioInput,
    ) -> Result<Self> {
        let ctx = WorkflowCtx::begin(
            journal,
            WORKFLOW_KIND,
            Some(input.username.clone()),
            input,
        )
        .await?;
        Ok(Self {
            registry,
            ctx,
            status: StatusCell::new(),
        })
    }

    /// Rebuild an interrupted run from its journal, returning the
    /// workflow and the input it was started with.
    pub async fn resume(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        run_id: &RunId,
    ) -> Result<(Self, PortfolioInput)> {
        let (ctx, record) = WorkflowCtx::resume(journal, run_id).await?;
        if record.metadata.workflow != WORKFLOW_KIND {
            return Err(WorkflowError::WrongWorkflowKind {
                run_id: run_id.to_string(),
                expected: WORKFLOW_KIND.to_string(),
                actual: record.metadata.workflow,
            });
        }
        let input: PortfolioInput = serde_json::from_value(record.metadata.tags)?;
        Ok((
            Self {
                registry,
                ctx,
                status: StatusCell::new(),
            },
            input,
        ))
    }

    /// Begin and spawn the run, returning a handle for status polling
    /// and joining.
    pub async fn start(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        input: PortfolioInput,
    ) -> Result<WorkflowHandle<PortfolioStatus, PortfolioOutcome>> {
        let workflow = Self::begin(journal, registry, &input).await?;
        Ok(workflow.spawn(input))
    }

    /// Resume and spawn an interrupted run.
    pub async fn resume_start(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        run_id: &RunId,
    ) -> Result<WorkflowHandle<PortfolioStatus, PortfolioOutcome>> {
        let (workflow, input) = Self::resume(journal, registry, run_id).await?;
        Ok(workflow.spawn(input))
    }

    fn spawn(self, input: PortfolioInput) -> WorkflowHandle<PortfolioStatus, PortfolioOutcome> {
        let run_id = self.ctx.run_id().clone();
        let status = self.status.reader();
        let join = tokio::spawn(async move { self.run(&input).await });
        WorkflowHandle::new(run_id, status, join)
    }

    pub fn run_id(&self) -> &RunId {
        self.ctx.run_id()
    }

    pub fn status(&self) -> PortfolioStatus {
        self.status.snapshot()
    }

    pub fn status_reader(&self) -> StatusReader<PortfolioStatus> {
        self.status.reader()
    }

    /// Drive the pipeline to its terminal outcome.
    pub async fn run(&self, input: &PortfolioInput) -> Result<PortfolioOutcome> {
        let span = WorkflowSpan::span(&self.ctx.run_id().to_string());
        async move {
            self.enter_stage(PortfolioStage::Starting).await?;

            self.enter_stage(PortfolioStage::Scanning).await?;
            let repos = match self.fetch_repos(input).await {
                Ok(repos) => repos,
                Err(WorkflowError::Activity(err)) => {
                    return self.fail("list_repos_extended", err).await
                }
                Err(other) => return Err(other),
            };
            self.status.update(|s| s.total_repos = repos.len());

            self.enter_stage(PortfolioStage::Analyzing).await?;
            let mut candidates: Vec<SelectionCandidate> = Vec::new();
            let mut errors: Vec<String> = Vec::new();
            for group in repos.chunks(ANALYZE_BATCH_SIZE) {
                // All analyses of a group launch before any is awaited.
                let analyses = futures::future::join_all(
                    group
                        .iter()
                        .map(|repo| self.analyze_repo(repo, &input.access_token)),
                )
                .await;
                for analysis in analyses {
                    let analysis = analysis?;
                    self.status.update(|s| {
                        s.analyzed += 1;
                        if let Some(error) = &analysis.error {
                            s.errors.push(error.clone());
                        }
                    });
                    if let Some(error) = analysis.error {
                        errors.push(error);
                    }
                    candidates.push(analysis.candidate);
                }
            }

            self.enter_stage(PortfolioStage::Selecting).await?;
            let selected = select_top_projects(&candidates);
            if selected.is_empty() {
                return self
                    .fail_with_message("no eligible repositories", errors)
                    .await;
            }
            let top_repos: Vec<String> = selected.iter().map(|c| c.full_name.clone()).collect();
            self.status.update(|s| s.top_repos = top_repos.clone());

            self.enter_stage(PortfolioStage::Generating).await?;
            let context = ProfileContext {
                username: input.username.clone(),
                selected,
                language_counts: language_counts(&repos),
            };
            let profile = match self.generate_profile(input, &context).await {
                Ok(profile) => profile,
                Err(WorkflowError::Activity(err)) => return self.fail("generate_profile", err).await,
                Err(other) => return Err(other),
            };

            self.enter_stage(PortfolioStage::Publishing).await?;
            let publication = match self.publish(input, &profile).await {
                Ok(publication) => publication,
                Err(WorkflowError::Activity(err)) => return self.fail("publish_profile", err).await,
                Err(other) => return Err(other),
            };

            self.enter_stage(PortfolioStage::Complete).await?;
            self.status.update(|s| {
                s.profile_url = Some(publication.profile_url.clone());
                s.pr_url = publication.pr_url.clone();
            });
            let outcome = PortfolioOutcome {
                status: OutcomeStatus::Success,
                top_repos,
                profile_url: Some(publication.profile_url),
                pr_url: publication.pr_url,
                errors,
            };
            self.ctx.finish_ok(&outcome).await?;
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Journal a stage transition and mirror it in the queryable status.
    async fn enter_stage(&self, stage: PortfolioStage) -> Result<()> {
        self.ctx.enter_stage(&stage.to_string()).await?;
        self.status.update(|s| s.stage = stage);
        Ok(())
    }

    async fn fetch_repos(&self, input: &PortfolioInput) -> Result<Vec<RepoMetadata>> {
        let opts = ActivityOptions::retried(FETCH_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let host = self.registry.host.clone();
        self.ctx
            .activity("list_repos_extended", &opts, || {
                let host = host.clone();
                let token = input.access_token.clone();
                async move { host.list_repos_extended(&token).await }
            })
            .await
    }

    /// One repository's analysis, journaled under `analyze:{full_name}`.
    /// A failing analysis zero-scores the candidate and records a note;
    /// it never stops the group or the run.
    async fn analyze_repo(
        &self,
        repo: &RepoMetadata,
        token: &AccessToken,
    ) -> Result<CandidateAnalysis> {
        let key = format!("analyze:{}", repo.full_name);
        let opts = ActivityOptions::retried(ANALYZE_TIMEOUT, ANALYZE_ATTEMPTS, ANALYZE_BACKOFF);
        let host = self.registry.host.clone();
        let activity = key.clone();
        let meta = repo.clone();
        let token = token.clone();
        self.ctx
            .step(&key, || async move {
                let outcome = invoke(&activity, &opts, || {
                    let host = host.clone();
                    let name = meta.full_name.clone();
                    let token = token.clone();
                    async move { host.analyze_health(&name, &token).await }
                })
                .await;
                Ok(match outcome {
                    Ok(result) => CandidateAnalysis {
                        candidate: SelectionCandidate::from_metadata(&meta, result.health_score),
                        error: None,
                    },
                    Err(err) => CandidateAnalysis {
                        candidate: SelectionCandidate::from_metadata(&meta, 0),
                        error: Some(format!("{}: {}", meta.full_name, err)),
                    },
                })
            })
            .await
    }

    async fn generate_profile(
        &self,
        input: &PortfolioInput,
        context: &ProfileContext,
    ) -> Result<String> {
        let opts = ActivityOptions::retried(PROFILE_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let model = self.registry.model.clone();
        self.ctx
            .activity("generate_profile", &opts, || {
                let model = model.clone();
                let username = input.username.clone();
                let context = context.clone();
                async move { model.generate_profile(&username, &context).await }
            })
            .await
    }

    async fn publish(
        &self,
        input: &PortfolioInput,
        profile: &str,
    ) -> Result<ProfilePublication> {
        let opts = ActivityOptions::retried(PUBLISH_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let host = self.registry.host.clone();
        self.ctx
            .activity("publish_profile", &opts, || {
                let host = host.clone();
                let username = input.username.clone();
                let content = profile.to_string();
                let token = input.access_token.clone();
                async move { host.publish_profile(&username, &content, &token).await }
            })
            .await
    }

    /// Terminal failure of a required step.
    async fn fail(&self, activity: &str, err: ActivityError) -> Result<PortfolioOutcome> {
        self.fail_with_message(&format!("{activity}: {err}"), self.status.snapshot().errors)
            .await
    }

    async fn fail_with_message(
        &self,
        message: &str,
        mut errors: Vec<String>,
    ) -> Result<PortfolioOutcome> {
        errors.push(message.to_string());
        let snapshot = self.status.snapshot();
        self.status.update(|s| {
            s.stage = PortfolioStage::Failed;
            s.errors.push(message.to_string());
        });
        let outcome = PortfolioOutcome {
            status: OutcomeStatus::Failure,
            top_repos: snapshot.top_repos,
            profile_url: None,
            pr_url: None,
            errors,
        };
        self.ctx.finish_failed(&outcome).await?;
        Ok(outcome)
    }
}
