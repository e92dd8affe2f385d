//! Single-repository health analysis.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activities::{AccessToken, ActivityRegistry};
use crate::domain::RepoHealthResult;
use crate::error::Result;
use crate::obs::WorkflowSpan;
use crate::runtime::{ActivityOptions, WorkflowCtx};
use verdant_state::WorkflowJournal;

/// Workflow kind recorded in the journal.
pub const WORKFLOW_KIND: &str = "analysis";

const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Input to [`AnalysisWorkflow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub repo_full_name: String,
    pub access_token: AccessToken,
}

/// Health check of a single repository: one bounded activity call with
/// no retry of its own. Callers needing resilience wrap it, as the
/// batch workflow does.
pub struct AnalysisWorkflow {
    registry: ActivityRegistry,
}

impl AnalysisWorkflow {
    pub fn new(registry: ActivityRegistry) -> Self {
        Self { registry }
    }

    /// Run the analysis under an existing context. The outcome is
    /// journaled under a key derived from the repository name, so batch
    /// parents can embed many of these in one run.
    pub async fn run(
        &self,
        ctx: &WorkflowCtx,
        input: &AnalysisInput,
    ) -> Result<RepoHealthResult> {
        let opts = ActivityOptions::no_retry(ANALYZE_TIMEOUT);
        let key = format!("analyze:{}", input.repo_full_name);
        let host = self.registry.host.clone();
        ctx.activity(&key, &opts, || {
            let host = host.clone();
            let name = input.repo_full_name.clone();
            let token = input.access_token.clone();
            async move { host.analyze_health(&name, &token).await }
        })
        .await
    }

    /// Run the analysis as its own journaled run. An activity failure
    /// marks the run failed and propagates to the caller unmodified.
    pub async fn execute(
        journal: Arc<dyn WorkflowJournal>,
        registry: ActivityRegistry,
        input: AnalysisInput,
    ) -> Result<RepoHealthResult> {
        let ctx = WorkflowCtx::begin(
            journal,
            WORKFLOW_KIND,
            Some(input.repo_full_name.clone()),
            &input,
        )
        .await?;
        let _span = WorkflowSpan::enter(&ctx.run_id().to_string());
        let workflow = AnalysisWorkflow::new(registry);
        match workflow.run(&ctx, &input).await {
            Ok(result) => {
                ctx.finish_ok(&result).await?;
                Ok(result)
            }
            Err(err) => {
                ctx.abandon().await;
                Err(err)
            }
        }
    }
}
