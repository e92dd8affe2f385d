//! Batch fan-out of health analyses over a repository listing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::activities::{AccessToken, ActivityRegistry};
use crate::domain::{BatchOutcome, BatchStatus, OutcomeStatus, RepoHealthResult, RepoSummary};
use crate::error::{Result, WorkflowError};
use crate::obs::WorkflowSpan;
use crate::runtime::{invoke, ActivityOptions, StatusCell, StatusReader, WorkflowCtx};
use crate::workflows::handle::WorkflowHandle;
use verdant_state::{RunId, WorkflowJournal};

/// Workflow kind recorded in the journal.
pub const WORKFLOW_KIND: &str = "batch_gardening";

const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Input to [`BatchGardeningWorkflow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGardeningInput {
    pub access_token: AccessToken,

    /// Analyze at most this many repositories from the listing.
    pub limit: usize,
}

/// Journaled outcome of one child analysis. A failed analysis is stored
/// as a synthesized zero-score record plus the error note, so replay
/// reproduces the identical record, timestamp included.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChildAnalysis {
    result: RepoHealthResult,
    error: Option<String>,
}

/// Fans out one health analysis per listed repository, all launched
/// before any is awaited. A child's failure never aborts the batch: it
/// is recorded and its siblings continue. Results accumulate in
/// completion order.
pub struct BatchGardeningWorkflow {
    registry: ActivityRegistry,
    ctx: WorkflowCtx,
    status: StatusCell<BatchStatus>,
}

impl BatchGardeningWorkflow {
    /// Create a fresh journaled run.
    pub async fn begin(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        input: &BatchGardeningInput,
    ) -> Result<Self> {
        let ctx = WorkflowCtx::begin(journal, WORKFLOW_KIND, None, input).await?;
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
    ) -> Result<(Self, BatchGardeningInput)> {
        let (ctx, record) = WorkflowCtx::resume(journal, run_id).await?;
        if record.metadata.workflow != WORKFLOW_KIND {
            return Err(WorkflowError::WrongWorkflowKind {
                run_id: run_id.to_string(),
                expected: WORKFLOW_KIND.to_string(),
                actual: record.metadata.workflow,
            });
        }
        let input: BatchGardeningInput = serde_json::from_value(record.metadata.tags)?;
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
        input: BatchGardeningInput,
    ) -> Result<WorkflowHandle<BatchStatus, BatchOutcome>> {
        let workflow = Self::begin(journal, registry, &input).await?;
        Ok(workflow.spawn(input))
    }

    /// Resume and spawn an interrupted run.
    pub async fn resume_start(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        run_id: &RunId,
    ) -> Result<WorkflowHandle<BatchStatus, BatchOutcome>> {
        let (workflow, input) = Self::resume(journal, registry, run_id).await?;
        Ok(workflow.spawn(input))
    }

    fn spawn(self, input: BatchGardeningInput) -> WorkflowHandle<BatchStatus, BatchOutcome> {
        let run_id = self.ctx.run_id().clone();
        let status = self.status.reader();
        let join = tokio::spawn(async move { self.run(&input).await });
        WorkflowHandle::new(run_id, status, join)
    }

    pub fn run_id(&self) -> &RunId {
        self.ctx.run_id()
    }

    /// Snapshot the live counters. Readers never observe a result
    /// without its `completed` increment.
    pub fn status(&self) -> BatchStatus {
        self.status.snapshot()
    }

    pub fn status_reader(&self) -> StatusReader<BatchStatus> {
        self.status.reader()
    }

    /// Drive the batch to its terminal outcome.
    pub async fn run(&self, input: &BatchGardeningInput) -> Result<BatchOutcome> {
        let span = WorkflowSpan::span(&self.ctx.run_id().to_string());
        async move {
            let host = self.registry.host.clone();
            let token = input.access_token.clone();
            let limit = input.limit;
            let listing: Result<Vec<RepoSummary>> = self
                .ctx
                .activity("list_repos", &ActivityOptions::no_retry(LIST_TIMEOUT), || {
                    let host = host.clone();
                    let token = token.clone();
                    async move { host.list_repos(&token, limit).await }
                })
                .await;

            // Without a listing there is no batch to run.
            let mut repos = match listing {
                Ok(repos) => repos,
                Err(WorkflowError::Activity(err)) => {
                    let outcome = BatchOutcome {
                        status: OutcomeStatus::Failure,
                        results: Vec::new(),
                        errors: vec![err.to_string()],
                    };
                    self.ctx.finish_failed(&outcome).await?;
                    return Ok(outcome);
                }
                Err(other) => return Err(other),
            };
            repos.truncate(input.limit);
            self.status.update(|s| s.total = repos.len());

            // Stable per-child journal keys; a duplicate name gets an index
            // suffix so both children keep distinct cache entries.
            let mut seen: HashMap<String, usize> = HashMap::new();
            let mut settled: Vec<(usize, String, RepoSummary)> = Vec::new();
            let mut live: Vec<(String, RepoSummary)> = Vec::new();
            for repo in repos {
                let count = seen.entry(repo.full_name.clone()).or_insert(0);
                let key = if *count == 0 {
                    format!("analyze:{}", repo.full_name)
                } else {
                    format!("analyze:{}#{}", repo.full_name, *count)
                };
                *count += 1;
                match self.ctx.replay_position(&key) {
                    Some(pos) => settled.push((pos, key, repo)),
                    None => live.push((key, repo)),
                }
            }

            let mut errors = Vec::new();

            // Children already settled in the journal come back first, in
            // journal order, so a resumed run rebuilds the same completion
            // order it had recorded.
            settled.sort_by_key(|(pos, _, _)| *pos);
            for (_, key, repo) in settled {
                let child = self
                    .analyze_child(key, repo, input.access_token.clone())
                    .await?;
                self.accumulate(child, &mut errors);
            }

            // Launch every remaining child before awaiting any.
            let mut pending: FuturesUnordered<_> = live
                .into_iter()
                .map(|(key, repo)| self.analyze_child(key, repo, input.access_token.clone()))
                .collect();
            while let Some(child) = pending.next().await {
                let child = child?;
                self.accumulate(child, &mut errors);
            }

            let outcome = BatchOutcome {
                status: OutcomeStatus::Success,
                results: self.status.snapshot().results,
                errors,
            };
            self.ctx.finish_ok(&outcome).await?;
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// One child analysis, journaled under `key`. Activity failures are
    /// absorbed into a synthesized failure record; only substrate faults
    /// surface as errors.
    async fn analyze_child(
        &self,
        key: String,
        repo: RepoSummary,
        token: AccessToken,
    ) -> Result<ChildAnalysis> {
        let host = self.registry.host.clone();
        let opts = ActivityOptions::no_retry(ANALYZE_TIMEOUT);
        let activity = key.clone();
        let full_name = repo.full_name;
        self.ctx
            .step(&key, || async move {
                let outcome = invoke(&activity, &opts, || {
                    let host = host.clone();
                    let name = full_name.clone();
                    let token = token.clone();
                    async move { host.analyze_health(&name, &token).await }
                })
                .await;
                Ok(match outcome {
                    Ok(result) => ChildAnalysis {
                        result,
                        error: None,
                    },
                    Err(err) => ChildAnalysis {
                        result: RepoHealthResult::analysis_failed(&full_name, Utc::now()),
                        error: Some(format!("{full_name}: {err}")),
                    },
                })
            })
            .await
    }

    /// Fold one settled child into the status under a single lock, so a
    /// status reader never sees a result without its counter increment.
    fn accumulate(&self, child: ChildAnalysis, errors: &mut Vec<String>) {
        if let Some(error) = child.error {
            errors.push(error);
        }
        self.status.update(|s| {
            s.results.push(child.result);
            s.completed += 1;
        });
    }
}
