// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock task runner for testing.
//!
//! A simple runner implementation that simulates job execution without
//! spawning processes or containers.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::{Result, TaskError, TaskPayload, TaskRunner};

/// Mock task runner for testing.
pub struct MockRunner {
    /// Optional delay to simulate execution time (in milliseconds)
    pub execution_delay_ms: u64,
    /// If true, tasks will fail with `failure_message`
    pub fail_by_default: bool,
    /// Message used for simulated failures
    pub failure_message: String,
    /// If true, `run` never returns. This is useful for testing that a
    /// dispatched operation stays in its running state.
    pub never_complete: bool,
    calls: Arc<Mutex<Vec<(String, TaskPayload)>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner that succeeds.
    pub fn new() -> Self {
        Self {
            execution_delay_ms: 10,
            fail_by_default: false,
            failure_message: "Mock failure".to_string(),
            never_complete: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock runner that fails by default.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::new()
        }
    }

    /// Create a mock runner that fails with a specific message.
    pub fn fail_with(message: impl Into<String>) -> Self {
        Self {
            fail_by_default: true,
            failure_message: message.into(),
            ..Self::new()
        }
    }

    /// Create a mock runner whose tasks never complete on their own.
    pub fn never_completing() -> Self {
        Self {
            execution_delay_ms: 0,
            never_complete: true,
            ..Self::new()
        }
    }

    /// Set the simulated execution delay.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.execution_delay_ms = delay_ms;
        self
    }

    /// The (task, payload) pairs this runner has been asked to execute.
    pub async fn calls(&self) -> Vec<(String, TaskPayload)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TaskRunner for MockRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, task: &str, payload: &TaskPayload) -> Result<()> {
        self.calls
            .lock()
            .await
            .push((task.to_string(), payload.clone()));

        if self.never_complete {
            std::future::pending::<()>().await;
        }

        if self.execution_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.execution_delay_ms)).await;
        }

        if self.fail_by_default {
            Err(TaskError::Failed(self.failure_message.clone()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_payload() -> TaskPayload {
        TaskPayload::new(1, 2, 3)
    }

    #[tokio::test]
    async fn test_mock_runner_success() {
        let runner = MockRunner::new();
        let result = runner.run("generate-analysis", &test_payload()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mock_runner_failure() {
        let runner = MockRunner::failing();
        let result = runner.run("generate-analysis", &test_payload()).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Mock failure");
    }

    #[tokio::test]
    async fn test_mock_runner_fail_with_message() {
        let runner = MockRunner::fail_with("disk full");
        let err = runner
            .run("generate-analysis", &test_payload())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_mock_runner_records_calls() {
        let runner = MockRunner::new();
        runner
            .run("scenario-create", &test_payload().with_source_scenario(7))
            .await
            .unwrap();

        let calls = runner.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "scenario-create");
        assert_eq!(calls[0].1.source_scenario_id, Some(7));
    }

    #[tokio::test]
    async fn test_mock_runner_never_completing() {
        let runner = Arc::new(MockRunner::never_completing());
        let runner_clone = runner.clone();
        let task = tokio::spawn(async move {
            let _ = runner_clone.run("generate-analysis", &test_payload()).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(
            !task.is_finished(),
            "never_completing runner should stay running indefinitely"
        );
        task.abort();
    }

    #[test]
    fn test_runner_type() {
        assert_eq!(MockRunner::new().runner_type(), "mock");
    }
}
