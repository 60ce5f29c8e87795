//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;

use super::{OperationLogRecord, OperationRecord, Persistence, ProjectRecord, ScenarioRecord};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// This convenience constructor handles all setup:
    /// - Creates parent directories if they don't exist
    /// - Creates the database file if it doesn't exist
    /// - Connects to the database with sensible defaults
    /// - Runs all migrations
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file (e.g., ".data/reachway.db")
    ///
    /// # Example
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/reachway.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        // Build connection URL
        let path_str = path.to_string_lossy();
        let url = format!("sqlite:{}?mode=rwc", path_str);

        // Create pool with reasonable defaults
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        // Run migrations
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn insert_operation(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
        active: bool,
        created_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO operations (kind, project_id, scenario_id, active, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind)
        .bind(project_id)
        .bind(scenario_id)
        .bind(active)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => Ok(res.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(CoreError::OperationConflict {
                    kind: kind.to_string(),
                    project_id,
                    scenario_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_operation(&self, id: i64) -> Result<Option<OperationRecord>, CoreError> {
        let record = sqlx::query_as::<_, OperationRecord>(
            r#"
            SELECT id, kind, project_id, scenario_id, active, created_at
            FROM operations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_latest_operation(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<Option<OperationRecord>, CoreError> {
        let record = sqlx::query_as::<_, OperationRecord>(
            r#"
            SELECT id, kind, project_id, scenario_id, active, created_at
            FROM operations
            WHERE kind = ? AND project_id = ? AND scenario_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(kind)
        .bind(project_id)
        .bind(scenario_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn append_log_entry(
        &self,
        operation_id: i64,
        event: &str,
        data: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO operation_logs (operation_id, event, data, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(operation_id)
        .bind(event)
        .bind(data)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_log(&self, operation_id: i64) -> Result<Vec<OperationLogRecord>, CoreError> {
        let entries = sqlx::query_as::<_, OperationLogRecord>(
            r#"
            SELECT id, operation_id, event, data, created_at
            FROM operation_logs
            WHERE operation_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(operation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_log_entries(
        &self,
        operation_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OperationLogRecord>, CoreError> {
        let entries = sqlx::query_as::<_, OperationLogRecord>(
            r#"
            SELECT id, operation_id, event, data, created_at
            FROM operation_logs
            WHERE operation_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(operation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn count_log_entries(&self, operation_id: i64) -> Result<i64, CoreError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM operation_logs WHERE operation_id = ?
            "#,
        )
        .bind(operation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn clear_active_marker(&self, operation_id: i64) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE operations
            SET active = 0
            WHERE id = ?
            "#,
        )
        .bind(operation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_operations(
        &self,
        project_id: i64,
        scenario_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OperationRecord>, CoreError> {
        let records = if let Some(scenario_id) = scenario_id {
            sqlx::query_as::<_, OperationRecord>(
                r#"
                SELECT id, kind, project_id, scenario_id, active, created_at
                FROM operations
                WHERE project_id = ? AND scenario_id = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(project_id)
            .bind(scenario_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, OperationRecord>(
                r#"
                SELECT id, kind, project_id, scenario_id, active, created_at
                FROM operations
                WHERE project_id = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(records)
    }

    async fn count_operations(
        &self,
        project_id: i64,
        scenario_id: Option<i64>,
    ) -> Result<i64, CoreError> {
        let (count,): (i64,) = if let Some(scenario_id) = scenario_id {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM operations
                WHERE project_id = ? AND scenario_id = ?
                "#,
            )
            .bind(project_id)
            .bind(scenario_id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM operations WHERE project_id = ?
                "#,
            )
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?
        };

        Ok(count)
    }

    async fn get_project(&self, id: i64) -> Result<Option<ProjectRecord>, CoreError> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            r#"
            SELECT id, name, status, created_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_scenario(&self, id: i64) -> Result<Option<ScenarioRecord>, CoreError> {
        let record = sqlx::query_as::<_, ScenarioRecord>(
            r#"
            SELECT id, project_id, name, status, master, created_at
            FROM scenarios
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_scenario(
        &self,
        project_id: i64,
        name: &str,
        status: &str,
    ) -> Result<ScenarioRecord, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO scenarios (project_id, name, status, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(project_id)
        .bind(name)
        .bind(status)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let record = self
            .get_scenario(id)
            .await?
            .ok_or_else(|| CoreError::DatabaseError {
                operation: "insert_scenario".to_string(),
                details: format!("Scenario {} missing after insert", id),
            })?;

        Ok(record)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
