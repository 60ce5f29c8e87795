// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subprocess task runner.
//!
//! Runs a configured worker program as a local subprocess. The task name is
//! passed as the first argument and the JSON-serialized payload as the
//! second; the worker's exit status is the completion contract.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use reachway_core::runner::{TaskError, TaskPayload, TaskRunner};

use crate::stderr_preview;

/// Subprocess runner configuration
#[derive(Debug, Clone)]
pub struct ProcessRunnerConfig {
    /// Worker program invoked for every task
    pub program: PathBuf,
}

impl ProcessRunnerConfig {
    /// Create configuration from environment variables.
    ///
    /// - `REACHWAY_JOB_COMMAND`: worker program path (default: `reachway-worker`)
    pub fn from_env() -> Self {
        Self {
            program: std::env::var("REACHWAY_JOB_COMMAND")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("reachway-worker")),
        }
    }
}

/// Task runner that spawns a local worker subprocess per task.
pub struct ProcessRunner {
    config: ProcessRunnerConfig,
}

impl ProcessRunner {
    /// Create a new subprocess runner
    pub fn new(config: ProcessRunnerConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(ProcessRunnerConfig::from_env())
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    fn runner_type(&self) -> &'static str {
        "process"
    }

    async fn run(&self, task: &str, payload: &TaskPayload) -> Result<(), TaskError> {
        let payload_json = serde_json::to_string(payload)?;

        debug!(
            program = %self.config.program.display(),
            task,
            operation_id = payload.operation_id,
            "Spawning worker subprocess"
        );

        let output = Command::new(&self.config.program)
            .arg(task)
            .arg(&payload_json)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TaskError::StartFailed(format!(
                    "worker program {} not found",
                    self.config.program.display()
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
