// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service runner: supervision of one dispatched job.
//!
//! A [`ServiceRunner`] pairs a named task with its payload and a
//! [`TaskRunner`] substrate, runs the job on a background task, and delivers
//! exactly one completion signal to the registered handler. Exactly-once
//! delivery is part of the contract: the handler is an `FnOnce` consumed by
//! the supervision task, so a second invocation cannot compile, and a job
//! that fails before making any progress (spawn failure included) still
//! produces the one signal.
//!
//! A service runner instance is not reused: `start()` consumes it, and the
//! returned [`DispatchHandle`] only observes the already-running dispatch.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::traits::{TaskError, TaskPayload, TaskRunner};

type CompletionHandler =
    Box<dyn FnOnce(Option<TaskError>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Supervisor for one external job dispatch.
pub struct ServiceRunner {
    task: String,
    payload: TaskPayload,
    runner: Arc<dyn TaskRunner>,
    on_complete: Option<CompletionHandler>,
}

impl fmt::Debug for ServiceRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRunner")
            .field("task", &self.task)
            .field("payload", &self.payload)
            .field("runner_type", &self.runner.runner_type())
            .field("on_complete", &self.on_complete.as_ref().map(|_| "..."))
            .finish()
    }
}

impl ServiceRunner {
    /// Create a service runner for one task dispatch.
    pub fn new(
        task: impl Into<String>,
        payload: TaskPayload,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            task: task.into(),
            payload,
            runner,
            on_complete: None,
        }
    }

    /// Register the completion handler.
    ///
    /// At most one handler is held; registering again replaces the previous
    /// one. The handler is invoked exactly once per dispatch, with `None` on
    /// success or `Some(error)` on any failure.
    pub fn on_complete<F, Fut>(mut self, handler: F) -> Self
    where
        F: FnOnce(Option<TaskError>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_complete = Some(Box::new(move |err| Box::pin(handler(err))));
        self
    }

    /// Dispatch the job and return immediately.
    ///
    /// The job runs on a spawned supervision task; the caller does not block
    /// on its completion. The returned handle identifies the dispatch and can
    /// be awaited when the caller (typically a test) needs the completion
    /// handler to have run.
    pub fn start(self) -> DispatchHandle {
        let dispatch_id = Uuid::new_v4();
        let task_name = self.task.clone();

        debug!(
            %dispatch_id,
            task = %self.task,
            operation_id = self.payload.operation_id,
            runner_type = self.runner.runner_type(),
            "Dispatching task"
        );

        let join = tokio::spawn(async move {
            let Self {
                task,
                payload,
                runner,
                on_complete,
            } = self;

            let result = runner.run(&task, &payload).await;
            match &result {
                Ok(()) => {
                    debug!(task = %task, operation_id = payload.operation_id, "Task completed");
                }
                Err(e) => {
                    warn!(
                        task = %task,
                        operation_id = payload.operation_id,
                        error = %e,
                        "Task failed"
                    );
                }
            }

            if let Some(handler) = on_complete {
                handler(result.err()).await;
            }
        });

        DispatchHandle {
            dispatch_id,
            task: task_name,
            join,
        }
    }
}

/// Handle for a started dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    dispatch_id: Uuid,
    task: String,
    join: JoinHandle<()>,
}

impl DispatchHandle {
    /// Unique identifier for this dispatch.
    pub fn dispatch_id(&self) -> Uuid {
        self.dispatch_id
    }

    /// The dispatched task name.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// True once the supervision task (job plus completion handler) has
    /// finished.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the supervision task to finish.
    ///
    /// This is a test/embedding convenience; orchestrators deliberately do
    /// not await it.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.join.await
    }
}
