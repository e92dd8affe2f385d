//! Per-repository documentation pipeline.
//!
//! Linear stages with one parallel fan-out:
//! `scanning → analyzing → generating → aggregating` ending in
//! `review_ready`, `partial_review_ready`, or `failure`. The pipeline
//! never publishes: its product is a draft proposal awaiting human
//! review.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::activities::{AccessToken, ActivityError, ActivityRegistry, RepoKey};
use crate::domain::{
    CodebaseSummary, DocKind, DocumentResult, JanitorOutcome, JanitorStage, JanitorStatus,
    OutcomeStatus, ScanResult,
};
use crate::error::{Result, WorkflowError};
use crate::obs::WorkflowSpan;
use crate::runtime::{invoke, ActivityOptions, StatusCell, StatusReader, WorkflowCtx};
use crate::workflows::handle::WorkflowHandle;
use verdant_state::{RunId, WorkflowJournal};

/// Workflow kind recorded in the journal.
pub const WORKFLOW_KIND: &str = "janitor";

const SCAN_TIMEOUT: Duration = Duration::from_secs(300);
const SCAN_ATTEMPTS: u32 = 3;
const SCAN_BACKOFF: Duration = Duration::from_secs(5);
const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(120);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
const SAVE_DRAFT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ATTEMPTS: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Input to [`JanitorWorkflow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorInput {
    pub repo: RepoKey,
    pub description: Option<String>,
    pub access_token: AccessToken,
}

/// Scans one repository, summarizes it, generates the document set in
/// parallel, and persists the successes as a draft proposal. A single
/// document's failure downgrades the outcome to partial; it never sinks
/// its siblings.
pub struct JanitorWorkflow {
    registry: ActivityRegistry,
    ctx: WorkflowCtx,
    status: StatusCell<JanitorStatus>,
}

impl JanitorWorkflow {
    /// Create a fresh journaled run.
    pub async fn begin(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        input: &JanitorInput,
    ) -> Result<Self> {
        let ctx = WorkflowCtx::begin(
            journal,
            WORKFLOW_KIND,
            Some(input.repo.full_name.clone()),
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
    ) -> Result<(Self, JanitorInput)> {
        let (ctx, record) = WorkflowCtx::resume(journal, run_id).await?;
        if record.metadata.workflow != WORKFLOW_KIND {
            return Err(WorkflowError::WrongWorkflowKind {
                run_id: run_id.to_string(),
                expected: WORKFLOW_KIND.to_string(),
                actual: record.metadata.workflow,
            });
        }
        let input: JanitorInput = serde_json::from_value(record.metadata.tags)?;
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
        input: JanitorInput,
    ) -> Result<WorkflowHandle<JanitorStatus, JanitorOutcome>> {
        let workflow = Self::begin(journal, registry, &input).await?;
        Ok(workflow.spawn(input))
    }

    /// Resume and spawn an interrupted run.
    pub async fn resume_start(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        run_id: &RunId,
    ) -> Result<WorkflowHandle<JanitorStatus, JanitorOutcome>> {
        let (workflow, input) = Self::resume(journal, registry, run_id).await?;
        Ok(workflow.spawn(input))
    }

    fn spawn(self, input: JanitorInput) -> WorkflowHandle<JanitorStatus, JanitorOutcome> {
        let run_id = self.ctx.run_id().clone();
        let status = self.status.reader();
        let join = tokio::spawn(async move { self.run(&input).await });
        WorkflowHandle::new(run_id, status, join)
    }

    pub fn run_id(&self) -> &RunId {
        self.ctx.run_id()
    }

    pub fn status(&self) -> JanitorStatus {
        self.status.snapshot()
    }

    pub fn status_reader(&self) -> StatusReader<JanitorStatus> {
        self.status.reader()
    }

    /// Drive the pipeline to its terminal outcome.
    pub async fn run(&self, input: &JanitorInput) -> Result<JanitorOutcome> {
        let span = WorkflowSpan::span(&self.ctx.run_id().to_string());
        async move {
            self.enter_stage(JanitorStage::Scanning).await?;
            let scan = match self.deep_scan(input).await {
                Ok(scan) => scan,
                Err(WorkflowError::Activity(err)) => return self.fail("deep_scan", err).await,
                Err(other) => return Err(other),
            };

            self.enter_stage(JanitorStage::Analyzing).await?;
            let summary = match self.summarize(input, &scan).await {
                Ok(summary) => summary,
                Err(WorkflowError::Activity(err)) => return self.fail("summarize", err).await,
                Err(other) => return Err(other),
            };

            self.enter_stage(JanitorStage::Generating).await?;
            let generations = futures::future::join_all(
                DocKind::ALL
                    .iter()
                    .map(|kind| self.generate_doc(*kind, input, &summary, &scan)),
            )
            .await;
            let results: Vec<DocumentResult> = generations.into_iter().collect::<Result<Vec<_>>>()?;

            self.enter_stage(JanitorStage::Aggregating).await?;
            let mut files: BTreeMap<String, String> = BTreeMap::new();
            let mut generated: Vec<String> = Vec::new();
            let mut errors: BTreeMap<String, String> = BTreeMap::new();
            for result in results {
                match result.content {
                    Some(content) => {
                        generated.push(result.filename.clone());
                        files.insert(result.filename, content);
                    }
                    None => {
                        let error = result
                            .error
                            .unwrap_or_else(|| "generation failed".to_string());
                        errors.insert(result.doc_type.label().to_string(), error);
                    }
                }
            }
            self.status.update(|s| {
                s.generated = generated.clone();
                s.errors = errors.clone();
            });

            // Nothing generated means nothing to review: fail without
            // touching the draft store.
            if files.is_empty() {
                self.status.update(|s| s.stage = JanitorStage::Failure);
                let outcome = JanitorOutcome {
                    status: OutcomeStatus::Failure,
                    files: Vec::new(),
                    errors,
                };
                self.ctx.finish_failed(&outcome).await?;
                return Ok(outcome);
            }

            if let Err(err) = self.save_draft(input.repo.id, &files).await {
                match err {
                    WorkflowError::Activity(err) => return self.fail("save_draft", err).await,
                    other => return Err(other),
                }
            }

            let (stage, status) = if errors.is_empty() {
                (JanitorStage::ReviewReady, OutcomeStatus::ReviewReady)
            } else {
                (
                    JanitorStage::PartialReviewReady,
                    OutcomeStatus::PartialReviewReady,
                )
            };
            self.status.update(|s| s.stage = stage);
            let outcome = JanitorOutcome {
                status,
                files: generated,
                errors,
            };
            self.ctx.finish_ok(&outcome).await?;
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Journal a stage transition and mirror it in the queryable status.
    async fn enter_stage(&self, stage: JanitorStage) -> Result<()> {
        self.ctx.enter_stage(&stage.to_string()).await?;
        self.status.update(|s| s.stage = stage);
        Ok(())
    }

    async fn deep_scan(&self, input: &JanitorInput) -> Result<ScanResult> {
        let opts = ActivityOptions::retried(SCAN_TIMEOUT, SCAN_ATTEMPTS, SCAN_BACKOFF);
        let host = self.registry.host.clone();
        self.ctx
            .activity("deep_scan", &opts, || {
                let host = host.clone();
                let repo = input.repo.clone();
                let token = input.access_token.clone();
                async move { host.deep_scan(&repo, &token).await }
            })
            .await
    }

    async fn summarize(&self, input: &JanitorInput, scan: &ScanResult) -> Result<CodebaseSummary> {
        let opts = ActivityOptions::retried(SUMMARIZE_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let model = self.registry.model.clone();
        self.ctx
            .activity("summarize", &opts, || {
                let model = model.clone();
                let repo_name = input.repo.full_name.clone();
                let description = input.description.clone();
                let scan = scan.clone();
                async move {
                    model
                        .summarize_codebase(&repo_name, description.as_deref(), &scan)
                        .await
                }
            })
            .await
    }

    /// One document generation, journaled under `generate:{filename}`.
    /// The activity's failure is absorbed into a failed [`DocumentResult`]
    /// so sibling generations keep running.
    async fn generate_doc(
        &self,
        kind: DocKind,
        input: &JanitorInput,
        summary: &CodebaseSummary,
        scan: &ScanResult,
    ) -> Result<DocumentResult> {
        let key = format!("generate:{}", kind.filename());
        let opts = ActivityOptions::retried(GENERATE_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let model = self.registry.model.clone();
        let activity = key.clone();
        let repo_name = input.repo.full_name.clone();
        let summary = summary.clone();
        let scan = scan.clone();
        self.ctx
            .step(&key, || async move {
                let outcome = invoke(&activity, &opts, || {
                    let model = model.clone();
                    let repo_name = repo_name.clone();
                    let summary = summary.clone();
                    let scan = scan.clone();
                    async move {
                        model
                            .generate_document(kind, &repo_name, &summary, &scan)
                            .await
                    }
                })
                .await;
                Ok(match outcome {
                    Ok(content) => DocumentResult::ok(kind, content),
                    Err(err) => DocumentResult::failed(kind, err.to_string()),
                })
            })
            .await
    }

    async fn save_draft(&self, repo_id: u64, files: &BTreeMap<String, String>) -> Result<()> {
        let opts = ActivityOptions::retried(SAVE_DRAFT_TIMEOUT, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF);
        let drafts = self.registry.drafts.clone();
        self.ctx
            .activity("save_draft", &opts, || {
                let drafts = drafts.clone();
                let files = files.clone();
                async move {
                    drafts
                        .save_draft(repo_id, files)
                        .await
                        .map_err(|err| ActivityError::Remote {
                            activity: "save_draft".to_string(),
                            message: err.to_string(),
                        })
                }
            })
            .await
    }

    /// Terminal failure of a required upstream step: record it under the
    /// activity's name and finish without a draft.
    async fn fail(&self, activity: &str, err: ActivityError) -> Result<JanitorOutcome> {
        let mut errors = BTreeMap::new();
        errors.insert(activity.to_string(), err.to_string());
        self.status.update(|s| {
            s.stage = JanitorStage::Failure;
            s.errors.insert(activity.to_string(), err.to_string());
        });
        let outcome = JanitorOutcome {
            status: OutcomeStatus::Failure,
            files: Vec::new(),
            errors,
        };
        self.ctx.finish_failed(&outcome).await?;
        Ok(outcome)
    }
}
