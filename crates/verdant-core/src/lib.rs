//! Verdant Core Library
//!
//! Durable repo-gardening pipelines: health analysis, batch fan-out,
//! per-repository documentation drafting, and account-wide portfolio
//! publishing, all journaled through `verdant-state` so interrupted
//! runs resume where they left off.

pub mod activities;
pub mod commit;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod obs;
pub mod runtime;
pub mod telemetry;
pub mod workflows;

pub use activities::{
    AccessToken, ActivityError, ActivityRegistry, ActivityResult, DocModel, ProfilePublication,
    RepoHost, RepoKey,
};

pub use commit::{commit_draft, CommitError, CommitReceipt, CommitRequest};

pub use domain::{
    score_health, select_top_projects, BatchOutcome, BatchStatus, CodebaseSummary, DocKind,
    DocumentResult, FileKind, FileNode, HealthSignals, JanitorOutcome, JanitorStage,
    JanitorStatus, OutcomeStatus, PortfolioOutcome, PortfolioStage, PortfolioStatus,
    ProfileContext, RepoHealthResult, RepoMetadata, RepoSummary, ScanResult, SelectionCandidate,
};

pub use error::{Result, WorkflowError};

pub use events::EventKind;

pub use runtime::{
    replay_inspect, ActivityOptions, ReplaySummary, RetryPolicy, StatusCell, StatusReader,
    WorkflowCtx,
};

pub use telemetry::init_tracing;

pub use workflows::{
    AnalysisInput, AnalysisWorkflow, BatchGardeningInput, BatchGardeningWorkflow, JanitorInput,
    JanitorWorkflow, PortfolioInput, PortfolioWorkflow, WorkflowHandle,
};

/// Crate version, from Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
