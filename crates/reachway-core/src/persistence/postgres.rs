// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::CoreError;

use super::{OperationLogRecord, OperationRecord, Persistence, ProjectRecord, ScenarioRecord};

/// PostgreSQL-backed persistence provider.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new PostgreSQL persistence provider from an existing pool.
    ///
    /// The caller is responsible for running migrations, e.g. via
    /// [`crate::migrations::run_postgres`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn insert_operation(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
        active: bool,
        created_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO operations (kind, project_id, scenario_id, active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(kind)
        .bind(project_id)
        .bind(scenario_id)
        .bind(active)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((id,)) => Ok(id),
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
            WHERE id = $1
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
            WHERE kind = $1 AND project_id = $2 AND scenario_id = $3
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
            VALUES ($1, $2, $3, $4)
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
            WHERE operation_id = $1
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
            WHERE operation_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
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
            SELECT COUNT(*) FROM operation_logs WHERE operation_id = $1
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
            SET active = FALSE
            WHERE id = $1
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
                WHERE project_id = $1 AND scenario_id = $2
                ORDER BY created_at DESC, id DESC
                LIMIT $3 OFFSET $4
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
                WHERE project_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2 OFFSET $3
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
                WHERE project_id = $1 AND scenario_id = $2
                "#,
            )
            .bind(project_id)
            .bind(scenario_id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM operations WHERE project_id = $1
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
            WHERE id = $1
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
            WHERE id = $1
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
        let record = sqlx::query_as::<_, ScenarioRecord>(
            r#"
            INSERT INTO scenarios (project_id, name, status, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, project_id, name, status, master, created_at
            "#,
        )
        .bind(project_id)
        .bind(name)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
