// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for reachway-core integration tests.
//!
//! Provides a TestContext that sets up a throwaway SQLite database with the
//! core schema, plus seeding helpers for the collaborator tables.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use reachway_core::persistence::{Persistence, SqlitePersistence};

/// Test context managing a temporary database for integration tests.
pub struct TestContext {
    pub pool: SqlitePool,
    persistence: Arc<SqlitePersistence>,
    _data_dir: TempDir,
}

/// Initialize test tracing once; RUST_LOG controls verbosity.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TestContext {
    /// Create a new test context with a migrated throwaway database.
    pub async fn new() -> Self {
        init_tracing();

        let data_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = data_dir.path().join("reachway-test.db");
        let url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePool::connect(&url).await.expect("connect sqlite");
        reachway_core::migrations::run_sqlite(&pool)
            .await
            .expect("run migrations");

        let persistence = Arc::new(SqlitePersistence::new(pool.clone()));

        Self {
            pool,
            persistence,
            _data_dir: data_dir,
        }
    }

    /// The persistence backend as the trait object the core consumes.
    pub fn persistence(&self) -> Arc<dyn Persistence> {
        self.persistence.clone()
    }

    /// Seed a project row, returning its id.
    pub async fn seed_project(&self, name: &str, status: &str) -> i64 {
        sqlx::query("INSERT INTO projects (name, status) VALUES (?, ?)")
            .bind(name)
            .bind(status)
            .execute(&self.pool)
            .await
            .expect("insert project")
            .last_insert_rowid()
    }

    /// Seed a scenario row, returning its id.
    pub async fn seed_scenario(&self, project_id: i64, name: &str, status: &str) -> i64 {
        sqlx::query("INSERT INTO scenarios (project_id, name, status) VALUES (?, ?, ?)")
            .bind(project_id)
            .bind(name)
            .bind(status)
            .execute(&self.pool)
            .await
            .expect("insert scenario")
            .last_insert_rowid()
    }

    /// Count operation rows for a (kind, project, scenario) triple.
    pub async fn count_operations_for_triple(
        &self,
        kind: &str,
        project_id: i64,
        scenario_id: i64,
    ) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM operations WHERE kind = ? AND project_id = ? AND scenario_id = ?",
        )
        .bind(kind)
        .bind(project_id)
        .bind(scenario_id)
        .fetch_one(&self.pool)
        .await
        .expect("count operations");
        count
    }

    /// The ordered event tags of an operation's log.
    pub async fn log_events(&self, operation_id: i64) -> Vec<String> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT event FROM operation_logs WHERE operation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(operation_id)
        .fetch_all(&self.pool)
        .await
        .expect("fetch log events");
        rows.into_iter().map(|(event,)| event).collect()
    }
}
