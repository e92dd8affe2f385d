//! SurrealDB schema migrations and initialization
//!
//! This module provides initialization functions to set up all tables
//! with proper constraints, indexes, and ACID guarantees.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::journal::StorageResult;

/// Initialize all Verdant tables in SurrealDB
///
/// This should be called once on first connection to set up the schema.
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    info!("Initializing Verdant SurrealDB schema");

    init_workflow_runs_table(db).await?;
    init_workflow_events_table(db).await?;
    init_draft_proposals_table(db).await?;

    info!("Verdant schema initialization complete");
    Ok(())
}

/// Initialize `workflow_runs` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE workflow_runs {
///   run_id:          STRING (primary key, unique)
///   input_digest:    STRING (indexed)
///   workflow:        STRING (indexed)
///   subject:         STRING? (repo full name or username)
///   tags:            OBJECT (serialized workflow input)
///   status:          STRING (enum: running | completed | failed | cancelled)
///   total_events:    INT
///   outcome_digest:  STRING?
///   duration_ms:     INT
///   success:         BOOL
///   created_at:      DATETIME (indexed)
///   completed_at:    DATETIME?
/// }
/// ```
///
/// Constraints:
/// - `run_id` is unique (prevents duplicate runs)
/// - `status` transitions: running → completed | failed | cancelled
///   (enforced via app logic)
/// - Terminal runs are immutable (enforced via app logic)
async fn init_workflow_runs_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing workflow_runs table");

    let sql = r#"
        DEFINE TABLE workflow_runs
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        -- Ensure run_id is unique
        DEFINE INDEX idx_run_id ON TABLE workflow_runs COLUMNS run_id UNIQUE;

        -- Index workflow for listing runs by kind
        DEFINE INDEX idx_workflow ON TABLE workflow_runs COLUMNS workflow;

        -- Index subject for finding runs by repo or account
        DEFINE INDEX idx_subject ON TABLE workflow_runs COLUMNS subject;

        -- Index created_at for time-range queries
        DEFINE INDEX idx_created_at ON TABLE workflow_runs COLUMNS created_at;

        -- Composite index (workflow, created_at) for per-kind history
        DEFINE INDEX idx_workflow_created_at ON TABLE workflow_runs COLUMNS workflow, created_at;

        -- Composite index (run_id, status) for state queries
        DEFINE INDEX idx_run_id_status ON TABLE workflow_runs COLUMNS run_id, status;
    "#;

    db.query(sql).await?;
    info!("✓ workflow_runs table initialized");
    Ok(())
}

/// Initialize `workflow_events` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE workflow_events {
///   run_id:     STRING (foreign key to workflow_runs.run_id)
///   seq:        INT (monotonic sequence within run)
///   kind:       STRING (event type)
///   payload:    OBJECT (event data)
///   timestamp:  DATETIME
/// }
/// ```
///
/// Constraints:
/// - `(run_id, seq)` is unique (prevents duplicate seq)
/// - `seq` is 1-indexed and monotonically increasing within a run
/// - Enforced via application logic during append_event()
async fn init_workflow_events_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing workflow_events table");

    let sql = r#"
        DEFINE TABLE workflow_events
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        -- Composite unique index: (run_id, seq) ensures no duplicate sequences per run
        -- This is the most critical constraint for replay ordering
        DEFINE INDEX idx_run_id_seq ON TABLE workflow_events COLUMNS run_id, seq UNIQUE;

        -- Index run_id for fast event retrieval by run
        DEFINE INDEX idx_run_id ON TABLE workflow_events COLUMNS run_id;

        -- Index event kind for filtering by event type
        DEFINE INDEX idx_kind ON TABLE workflow_events COLUMNS kind;
    "#;

    db.query(sql).await?;
    info!("✓ workflow_events table initialized");
    Ok(())
}

/// Initialize `draft_proposals` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE draft_proposals {
///   repo_id:     INT (unique, one draft per repository)
///   files:       OBJECT (filename → generated content)
///   updated_at:  DATETIME
/// }
/// ```
///
/// Semantics:
/// - At most one row per repo_id (unique index)
/// - Writes replace the whole row inside a transaction (last writer wins)
async fn init_draft_proposals_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing draft_proposals table");

    let sql = r#"
        DEFINE TABLE draft_proposals
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete FULL;

        -- One outstanding draft per repository
        DEFINE INDEX idx_repo_id ON TABLE draft_proposals COLUMNS repo_id UNIQUE;

        -- Index updated_at for housekeeping queries
        DEFINE INDEX idx_updated_at ON TABLE draft_proposals COLUMNS updated_at;
    "#;

    db.query(sql).await?;
    info!("✓ draft_proposals table initialized");
    Ok(())
}
