//! Verdant-State: SurrealDB persistence for Verdant workflows
//!
//! This crate provides the durable substrate under the workflow runtime:
//! an append-only journal of run events (replayable after a crash) and the
//! store of pending draft proposals awaiting human review.
//!
//! ## Key Components
//!
//! - `WorkflowJournal`: append-only event journal, one stream per run
//! - `DraftStore`: at most one pending doc draft per repository
//! - `SurrealJournal` / `SurrealDraftStore`: SurrealDB-backed implementations
//! - `fakes`: in-memory implementations for tests

mod error;
pub mod fakes;
pub mod journal;
mod migrations;
mod schema;
pub mod surreal;

pub use error::StorageError;
pub use journal::{
    ContentDigest, DraftRecord, DraftStore, JournalEvent, RunId, RunMetadata, RunRecord,
    RunStatus, RunSummary, StorageResult, WorkflowJournal,
};
pub use migrations::init_schema;
pub use surreal::{connect_from_env, connect_in_memory, CloudConfig, SurrealDraftStore, SurrealJournal};
