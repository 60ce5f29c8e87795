//! Persistence interfaces and backends for reachway-core.
//!
//! This module defines the persistence abstraction and backend implementations.
//! The operation log is append-only: entries are never updated or deleted, and
//! an operation's status is always derived from its ordered log, never from a
//! stored column.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use crate::error::CoreError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Operation record from the persistence layer.
///
/// Holds identity only. Status is not a column here; derive it from the
/// operation's log entries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationRecord {
    /// Database-assigned identifier.
    pub id: i64,
    /// Operation kind tag (e.g. "scenario-create", "generate-analysis").
    pub kind: String,
    /// Project this operation belongs to.
    pub project_id: i64,
    /// Scenario this operation belongs to.
    pub scenario_id: i64,
    /// Strict-mode conflict marker. Set on insert, cleared on terminal log
    /// entry. Never consulted for status queries.
    #[sqlx(default)]
    pub active: bool,
    /// When the operation was started.
    pub created_at: DateTime<Utc>,
}

/// One entry in an operation's append-only log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationLogRecord {
    /// Database primary key; with `created_at`, defines total order.
    pub id: i64,
    /// Operation this entry belongs to.
    pub operation_id: i64,
    /// Event tag ("start", "finish", "error", or a free-form progress tag).
    pub event: String,
    /// JSON payload serialized as text.
    pub data: Option<String>,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

impl OperationLogRecord {
    /// Decode the entry's JSON payload, if any.
    pub fn data_json(&self) -> Result<Option<serde_json::Value>, CoreError> {
        match &self.data {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

/// Project collaborator record. The core reads only id and status.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRecord {
    /// Database-assigned identifier.
    pub id: i64,
    /// Project name.
    pub name: String,
    /// Project status (e.g. "pending", "active").
    pub status: String,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
}

/// Scenario collaborator record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScenarioRecord {
    /// Database-assigned identifier.
    pub id: i64,
    /// Project this scenario belongs to.
    pub project_id: i64,
    /// Scenario name.
    pub name: String,
    /// Scenario status (e.g. "creating", "active").
    pub status: String,
    /// Whether this is the project's master scenario.
    #[sqlx(default)]
    pub master: bool,
    /// When the scenario was created.
    pub created_at: DateTime<Utc>,
}

/// Persistence interface used by operations and orchestrators.
///
/// Implementations must preserve insert order for log entries: `get_log`
/// and `list_log_entries` return entries ordered by `(created_at, id)`
/// ascending, so the append order issued by a single writer is the order
/// readers observe.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a new operation row and return its database-assigned id.
    ///
    /// When `active` is true the row participates in the partial unique
    /// index over (kind, project_id, scenario_id); a second active insert
    /// for the same triple must fail with [`CoreError::OperationConflict`].
    async fn insert_operation(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
        active: bool,
        created_at: DateTime<Utc>,
    ) -> Result<i64, CoreError>;

    /// Fetch an operation by id.
    async fn get_operation(&self, id: i64) -> Result<Option<OperationRecord>, CoreError>;

    /// Find the most recent operation for a (kind, project, scenario) triple.
    async fn find_latest_operation(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<Option<OperationRecord>, CoreError>;

    /// Append a log entry for an operation.
    async fn append_log_entry(
        &self,
        operation_id: i64,
        event: &str,
        data: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Fetch the full log for an operation, oldest first.
    async fn get_log(&self, operation_id: i64) -> Result<Vec<OperationLogRecord>, CoreError>;

    /// List log entries for an operation with pagination, oldest first.
    async fn list_log_entries(
        &self,
        operation_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OperationLogRecord>, CoreError>;

    /// Count log entries for an operation.
    async fn count_log_entries(&self, operation_id: i64) -> Result<i64, CoreError>;

    /// Clear the strict-mode conflict marker for an operation.
    ///
    /// Called when a terminal log entry is appended. Safe to call on an
    /// operation whose marker is already clear.
    async fn clear_active_marker(&self, operation_id: i64) -> Result<(), CoreError>;

    /// List operations for a project (optionally one scenario), newest first.
    async fn list_operations(
        &self,
        project_id: i64,
        scenario_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OperationRecord>, CoreError>;

    /// Count operations for a project (optionally one scenario).
    async fn count_operations(
        &self,
        project_id: i64,
        scenario_id: Option<i64>,
    ) -> Result<i64, CoreError>;

    /// Fetch a project by id.
    async fn get_project(&self, id: i64) -> Result<Option<ProjectRecord>, CoreError>;

    /// Fetch a scenario by id.
    async fn get_scenario(&self, id: i64) -> Result<Option<ScenarioRecord>, CoreError>;

    /// Insert a scenario row and return the stored record.
    async fn insert_scenario(
        &self,
        project_id: i64,
        name: &str,
        status: &str,
    ) -> Result<ScenarioRecord, CoreError>;

    /// Verify database connectivity.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}
