// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker CLI task runner.
//!
//! Runs tasks inside containers by shelling out to the Docker CLI, so the
//! core stays agnostic to local script vs container execution. The container
//! receives the same `<task> <payload-json>` argument contract as the
//! subprocess runner.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use reachway_core::runner::{TaskError, TaskPayload, TaskRunner};

use crate::stderr_preview;

/// Docker runner configuration
#[derive(Debug, Clone)]
pub struct DockerRunnerConfig {
    /// Docker CLI binary
    pub docker_binary: String,
    /// Worker image run for every task
    pub image: String,
    /// Extra `docker run` arguments (volumes, networks, env)
    pub run_args: Vec<String>,
}

impl DockerRunnerConfig {
    /// Create configuration from environment variables.
    ///
    /// - `REACHWAY_DOCKER_BINARY`: Docker CLI binary (default: `docker`)
    /// - `REACHWAY_JOB_IMAGE`: worker image (default: `reachway/worker:latest`)
    pub fn from_env() -> Self {
        Self {
            docker_binary: std::env::var("REACHWAY_DOCKER_BINARY")
                .unwrap_or_else(|_| "docker".to_string()),
            image: std::env::var("REACHWAY_JOB_IMAGE")
                .unwrap_or_else(|_| "reachway/worker:latest".to_string()),
            run_args: Vec::new(),
        }
    }
}

/// Task runner that executes each task in a throwaway Docker container.
pub struct DockerRunner {
    config: DockerRunnerConfig,
}

impl DockerRunner {
    /// Create a new Docker runner
    pub fn new(config: DockerRunnerConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(DockerRunnerConfig::from_env())
    }

    /// Build the full `docker run` argument vector for a task.
    fn build_args(&self, task: &str, payload_json: &str) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        args.extend(self.config.run_args.iter().cloned());
        args.push(self.config.image.clone());
        args.push(task.to_string());
        args.push(payload_json.to_string());
        args
    }
}

#[async_trait]
impl TaskRunner for DockerRunner {
    fn runner_type(&self) -> &'static str {
        "docker"
    }

    async fn run(&self, task: &str, payload: &TaskPayload) -> Result<(), TaskError> {
        let payload_json = serde_json::to_string(payload)?;
        let args = self.build_args(task, &payload_json);

        debug!(
            image = %self.config.image,
            task,
            operation_id = payload.operation_id,
            "Launching worker container"
        );

        let output = Command::new(&self.config.docker_binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TaskError::StartFailed(format!(
                    "docker binary '{}' not found",
                    self.config.docker_binary
                )),
                _ => TaskError::Io(e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TaskError::ExitCode {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: stderr_preview(&output.stderr),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let runner = DockerRunner::new(DockerRunnerConfig {
            docker_binary: "docker".to_string(),
            image: "reachway/worker:1.4".to_string(),
            run_args: vec!["--network".to_string(), "host".to_string()],
        });

        let args = runner.build_args("generate-analysis", r#"{"project_id":1}"#);
        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "--network",
                "host",
                "reachway/worker:1.4",
                "generate-analysis",
                r#"{"project_id":1}"#,
            ]
        );
    }

    #[test]
    fn test_runner_type() {
        let runner = DockerRunner::new(DockerRunnerConfig {
            docker_binary: "docker".to_string(),
            image: "reachway/worker:latest".to_string(),
            run_args: Vec::new(),
        });
        assert_eq!(runner.runner_type(), "docker");
    }

    #[tokio::test]
    async fn test_missing_docker_binary() {
        let runner = DockerRunner::new(DockerRunnerConfig {
            docker_binary: "/nonexistent/docker".to_string(),
            image: "reachway/worker:latest".to_string(),
            run_args: Vec::new(),
        });

        let err = runner
            .run("scenario-create", &TaskPayload::new(1, 2, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::StartFailed(_)));
    }
}
