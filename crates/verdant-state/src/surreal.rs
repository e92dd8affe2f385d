//! SurrealDB-backed journal and draft store implementations
//!
//! Uses `schema::RunRow`, `schema::EventRow`, and `schema::DraftRow` for
//! persistence, converting to/from `journal` types at the boundary.
//!
//! Supports in-memory (`mem://`), local (`surrealkv://`), and cloud
//! (WebSocket) connections through the same environment chain.

use std::collections::BTreeMap;

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::journal::{
    ContentDigest, DraftRecord, DraftStore, JournalEvent, RunId, RunMetadata, RunRecord,
    RunStatus, RunSummary, StorageResult, WorkflowJournal,
};
use crate::migrations;
use crate::schema::{DraftRow, EventRow, RunRow};

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "verdant")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: "verdant".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "verdant")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "verdant".to_string());
        let database = std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "main".to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Connect to an in-memory engine (`mem://`) and initialize the schema.
pub async fn connect_in_memory() -> StorageResult<Surreal<Any>> {
    let db = surrealdb::engine::any::connect("mem://")
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    db.use_ns("verdant")
        .use_db("main")
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    Ok(db)
}

/// Connect using the environment chain and initialize the schema.
///
/// Resolution order:
/// 1. Cloud config (SURREALDB_ENDPOINT/USERNAME/PASSWORD, WebSocket)
/// 2. SURREALDB_URL (any engine URL)
/// 3. Local persistence at `surrealkv://.verdant/db`
pub async fn connect_from_env() -> StorageResult<Surreal<Any>> {
    use surrealdb::opt::auth::{Database, Root};

    if let Ok(config) = CloudConfig::from_env() {
        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StorageError::Connection(format!("Root auth failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StorageError::Connection(format!("DB auth failed: {e}")))?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealDB connected (cloud)");
        return Ok(db);
    }

    if let Ok(url) = std::env::var("SURREALDB_URL") {
        let db = surrealdb::engine::any::connect(&url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        db.use_ns("verdant")
            .use_db("main")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealDB connected ({})", url);
        return Ok(db);
    }

    // Default to local persistence in .verdant/db
    let path = ".verdant/db";
    std::fs::create_dir_all(path).map_err(|e| {
        StorageError::Connection(format!(
            "Failed to create database directory {}: {}",
            path, e
        ))
    })?;
    let url = format!("surrealkv://{}", path);
    info!(
        "No cloud config or SURREALDB_URL found, using local persistence: {}",
        url
    );

    let db = surrealdb::engine::any::connect(&url)
        .await
        .map_err(|e| StorageError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns("verdant")
        .use_db("main")
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    Ok(db)
}

// ---------------------------------------------------------------------------
// SurrealJournal
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`WorkflowJournal`].
pub struct SurrealJournal {
    db: Surreal<Any>,
}

impl SurrealJournal {
    /// Wrap an existing connection (schema must already be initialized).
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        let db = connect_in_memory().await?;
        info!("SurrealJournal connected (in-memory)");
        Ok(Self { db })
    }

    /// Create from environment variables (see [`connect_from_env`]).
    pub async fn from_env() -> StorageResult<Self> {
        let db = connect_from_env().await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch a run row by ID, returning the DB row or RunNotFound.
    async fn fetch_run(&self, rid: &str) -> StorageResult<RunRow> {
        let rid_owned = rid.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM workflow_runs WHERE run_id = $rid")
            .bind(("rid", rid_owned))
            .await?;

        let rows: Vec<RunRow> = res.take(0)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: rid.to_string(),
            })
    }

    /// Fetch a run row and verify it is in "running" state.
    async fn fetch_running(&self, rid: &str) -> StorageResult<RunRow> {
        let row = self.fetch_run(rid).await?;
        if row.status != "running" {
            return Err(StorageError::InvalidRunState {
                run_id: rid.to_string(),
                status: row.status,
                expected: "running".to_string(),
            });
        }
        Ok(row)
    }

    /// Write back a terminal run row.
    async fn update_run(&self, rid: &str, row: RunRow) -> StorageResult<()> {
        let rid_owned = rid.to_string();
        self.db
            .query("UPDATE workflow_runs CONTENT $row WHERE run_id = $rid")
            .bind(("row", row))
            .bind(("rid", rid_owned))
            .await?;
        Ok(())
    }

    /// Convert a `schema::RunRow` (DB row) into a `journal::RunRecord`.
    fn row_to_record(row: RunRow) -> StorageResult<RunRecord> {
        let status = match row.status.as_str() {
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            other => {
                return Err(StorageError::Backend(format!(
                    "unknown run status: {other}"
                )))
            }
        };

        let summary = if status != RunStatus::Running {
            let outcome_digest = row.outcome_digest.map(ContentDigest::try_from).transpose()?;
            Some(RunSummary {
                total_events: row.total_events,
                outcome_digest,
                duration_ms: row.duration_ms,
                success: row.success,
            })
        } else {
            None
        };

        Ok(RunRecord {
            run_id: RunId(row.run_id),
            input_digest: ContentDigest::try_from(row.input_digest)?,
            metadata: RunMetadata {
                workflow: row.workflow,
                subject: row.subject,
                tags: row.tags,
            },
            status,
            summary,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }

    /// Convert a `schema::EventRow` (DB row) into a `journal::JournalEvent`.
    fn row_to_event(row: EventRow) -> JournalEvent {
        JournalEvent {
            seq: row.seq,
            kind: row.kind,
            payload: row.payload,
            timestamp: row.timestamp,
        }
    }
}

#[async_trait]
impl WorkflowJournal for SurrealJournal {
    async fn create_run(
        &self,
        input_digest: &ContentDigest,
        metadata: RunMetadata,
    ) -> StorageResult<RunId> {
        let run_id = RunId::new();
        let row = RunRow::new(
            run_id.0.clone(),
            input_digest.as_str().to_string(),
            metadata.workflow,
            metadata.subject,
            metadata.tags,
        );

        debug!(run_id = %run_id, "creating run");

        let _created: Option<RunRow> = self.db.create("workflow_runs").content(row).await?;

        Ok(run_id)
    }

    async fn append_event(&self, run_id: &RunId, event: JournalEvent) -> StorageResult<()> {
        self.fetch_running(&run_id.0).await?;

        let row = EventRow::new(run_id.0.clone(), event.seq, event.kind, event.payload);

        let _created: Option<EventRow> = self.db.create("workflow_events").content(row).await?;

        Ok(())
    }

    async fn complete_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        let row = self.fetch_running(&run_id.0).await?;

        let outcome_digest = summary
            .outcome_digest
            .as_ref()
            .map(|d| d.as_str().to_string());

        let updated = row.complete(
            summary.total_events,
            outcome_digest,
            summary.duration_ms,
            summary.success,
        );
        self.update_run(&run_id.0, updated).await
    }

    async fn fail_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        let row = self.fetch_running(&run_id.0).await?;

        let outcome_digest = summary
            .outcome_digest
            .as_ref()
            .map(|d| d.as_str().to_string());

        let updated = row.fail(summary.total_events, outcome_digest, summary.duration_ms);
        self.update_run(&run_id.0, updated).await
    }

    async fn cancel_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        let row = self.fetch_running(&run_id.0).await?;

        let updated = row.cancel(summary.total_events, summary.duration_ms);
        self.update_run(&run_id.0, updated).await
    }

    async fn get_run(&self, run_id: &RunId) -> StorageResult<RunRecord> {
        let row = self.fetch_run(&run_id.0).await?;
        Self::row_to_record(row)
    }

    async fn get_events(&self, run_id: &RunId) -> StorageResult<Vec<JournalEvent>> {
        // Verify run exists
        self.fetch_run(&run_id.0).await?;

        let rid_owned = run_id.0.clone();
        let mut res = self
            .db
            .query("SELECT * FROM workflow_events WHERE run_id = $rid ORDER BY seq ASC")
            .bind(("rid", rid_owned))
            .await?;

        let rows: Vec<EventRow> = res.take(0)?;

        Ok(rows.into_iter().map(Self::row_to_event).collect())
    }

    async fn list_runs(&self, workflow: Option<&str>) -> StorageResult<Vec<RunRecord>> {
        let rows: Vec<RunRow> = if let Some(kind) = workflow {
            let kind_owned = kind.to_string();
            let mut res = self
                .db
                .query("SELECT * FROM workflow_runs WHERE workflow = $wf ORDER BY created_at DESC")
                .bind(("wf", kind_owned))
                .await?;
            res.take(0)?
        } else {
            let mut res = self
                .db
                .query("SELECT * FROM workflow_runs ORDER BY created_at DESC")
                .await?;
            res.take(0)?
        };

        rows.into_iter().map(Self::row_to_record).collect()
    }
}

// ---------------------------------------------------------------------------
// SurrealDraftStore
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`DraftStore`].
pub struct SurrealDraftStore {
    db: Surreal<Any>,
}

impl SurrealDraftStore {
    /// Wrap an existing connection (schema must already be initialized).
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        let db = connect_in_memory().await?;
        info!("SurrealDraftStore connected (in-memory)");
        Ok(Self { db })
    }

    /// Create from environment variables (see [`connect_from_env`]).
    pub async fn from_env() -> StorageResult<Self> {
        let db = connect_from_env().await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl DraftStore for SurrealDraftStore {
    async fn save_draft(
        &self,
        repo_id: u64,
        files: BTreeMap<String, String>,
    ) -> StorageResult<()> {
        let row = DraftRow::new(repo_id, files);

        // Replace inside one transaction: a reader sees either the old
        // draft or the new one, never a partially written state.
        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE draft_proposals WHERE repo_id = $repo_id;
                CREATE draft_proposals CONTENT $row;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("repo_id", repo_id))
            .bind(("row", row))
            .await?;

        debug!(repo_id, "draft proposal saved");
        Ok(())
    }

    async fn load_draft(&self, repo_id: u64) -> StorageResult<Option<DraftRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM draft_proposals WHERE repo_id = $repo_id")
            .bind(("repo_id", repo_id))
            .await?;

        let rows: Vec<DraftRow> = res.take(0)?;

        Ok(rows.into_iter().next().map(|row| DraftRecord {
            repo_id: row.repo_id,
            files: row.files,
            updated_at: row.updated_at,
        }))
    }

    async fn clear_draft(&self, repo_id: u64) -> StorageResult<()> {
        self.db
            .query("DELETE draft_proposals WHERE repo_id = $repo_id")
            .bind(("repo_id", repo_id))
            .await?;

        debug!(repo_id, "draft proposal cleared");
        Ok(())
    }
}
