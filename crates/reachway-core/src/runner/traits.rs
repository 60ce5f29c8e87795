// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task runner trait definitions.
//!
//! Defines the abstract interface for the job execution substrate. The core
//! is agnostic to whether a task runs as a local subprocess, a Docker
//! container, or a test mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from task execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The task process/container could not be started at all.
    #[error("Failed to start task: {0}")]
    StartFailed(String),

    /// The task process exited with a non-zero code.
    #[error("Exit code {exit_code}: {stderr}")]
    ExitCode {
        /// Exit code from the process.
        exit_code: i32,
        /// Standard error output, truncated.
        stderr: String,
    },

    /// The task reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for task execution.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Payload handed to the external job.
///
/// Always carries the correlation ids; task-specific fields are optional and
/// omitted from the serialized form when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Project the job operates on.
    pub project_id: i64,
    /// Scenario the job operates on.
    pub scenario_id: i64,
    /// Operation tracking this job; the job appends its own log entries
    /// under this id.
    pub operation_id: i64,
    /// Source scenario for clone-based scenario creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_scenario_id: Option<i64>,
    /// Uploaded road-network file name for import-based scenario creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_network_file: Option<String>,
}

impl TaskPayload {
    /// Create a payload with the correlation ids only.
    pub fn new(project_id: i64, scenario_id: i64, operation_id: i64) -> Self {
        Self {
            project_id,
            scenario_id,
            operation_id,
            source_scenario_id: None,
            road_network_file: None,
        }
    }

    /// Set the clone source scenario.
    pub fn with_source_scenario(mut self, scenario_id: i64) -> Self {
        self.source_scenario_id = Some(scenario_id);
        self
    }

    /// Set the uploaded road-network file name.
    pub fn with_road_network_file(mut self, file_name: impl Into<String>) -> Self {
        self.road_network_file = Some(file_name.into());
        self
    }
}

/// Trait for task runners.
///
/// Runners are responsible for executing one named task to completion.
/// Different implementations can use subprocesses, Docker containers, etc.
///
/// Runners are PURE execution engines - they do NOT access the database.
/// Operation bookkeeping is handled by the caller through the completion
/// signal.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runner type identifier (e.g., "process", "docker", "mock")
    fn runner_type(&self) -> &'static str;

    /// Run a task to completion.
    ///
    /// Blocks until the underlying job exits. A spawn failure, a non-zero
    /// exit, or a job-reported failure all surface as `Err`; the caller
    /// relies on getting exactly one of `Ok`/`Err` per invocation.
    async fn run(&self, task: &str, payload: &TaskPayload) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization_omits_absent_fields() {
        let payload = TaskPayload::new(1, 2, 3);
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"project_id":1,"scenario_id":2,"operation_id":3}"#
        );
    }

    #[test]
    fn test_payload_with_source_scenario() {
        let payload = TaskPayload::new(1, 2, 3).with_source_scenario(9);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""source_scenario_id":9"#));
        assert!(!json.contains("road_network_file"));

        let back: TaskPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_with_road_network_file() {
        let payload = TaskPayload::new(1, 2, 3).with_road_network_file("roads.osm");
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""road_network_file":"roads.osm""#));
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::ExitCode {
            exit_code: 137,
            stderr: "killed".to_string(),
        };
        assert_eq!(err.to_string(), "Exit code 137: killed");

        let err = TaskError::Failed("disk full".to_string());
        assert_eq!(err.to_string(), "disk full");

        let err = TaskError::StartFailed("binary missing".to_string());
        assert_eq!(err.to_string(), "Failed to start task: binary missing");
    }
}
