//! Domain types shared by all Verdant workflows.
//!
//! Everything here is plain data plus pure functions: scoring, file-tree
//! shaping, project selection. Nothing in this module performs I/O, which
//! is what makes journaled replays of the workflows deterministic.

pub mod document;
pub mod health;
pub mod repo;
pub mod scan;
pub mod selection;
pub mod status;

pub use document::{CodebaseSummary, DocKind, DocumentResult};
pub use health::{score_health, HealthSignals, RepoHealthResult};
pub use repo::{RepoMetadata, RepoSummary};
pub use scan::{truncate_lines, FileKind, FileNode, ScanResult};
pub use selection::{language_counts, select_top_projects, ProfileContext, SelectionCandidate};
pub use status::{
    BatchOutcome, BatchStatus, JanitorOutcome, JanitorStage, JanitorStatus, OutcomeStatus,
    PortfolioOutcome, PortfolioStage, PortfolioStatus,
};
