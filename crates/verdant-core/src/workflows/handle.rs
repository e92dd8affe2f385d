//! Handles to spawned workflow runs.

use tokio::task::JoinHandle;

use crate::error::{Result, WorkflowError};
use crate::runtime::StatusReader;
use verdant_state::RunId;

/// A started workflow: its run id, a live status view, and the join
/// handle carrying the terminal outcome.
pub struct WorkflowHandle<S, O> {
    run_id: RunId,
    status: StatusReader<S>,
    join: JoinHandle<Result<O>>,
}

impl<S: Clone, O> WorkflowHandle<S, O> {
    pub(crate) fn new(
        run_id: RunId,
        status: StatusReader<S>,
        join: JoinHandle<Result<O>>,
    ) -> Self {
        Self {
            run_id,
            status,
            join,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Snapshot the workflow's current progress without blocking it.
    pub fn status(&self) -> S {
        self.status.get()
    }

    pub fn status_reader(&self) -> StatusReader<S> {
        self.status.clone()
    }

    /// Wait for the terminal outcome.
    pub async fn join(self) -> Result<O> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(WorkflowError::Task(err.to_string())),
        }
    }

    /// Kill the underlying task mid-flight. The journal keeps the run
    /// resumable afterwards.
    pub fn abort(&self) {
        self.join.abort();
    }
}
