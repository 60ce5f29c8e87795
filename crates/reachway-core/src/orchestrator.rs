// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestrators for scenario and analysis actions.
//!
//! An [`Orchestrator`] sequences one business action end to end: validate
//! external state, check for a conflicting in-flight operation, start a new
//! [`Operation`], dispatch a [`ServiceRunner`], and return to the caller
//! immediately - the HTTP response never waits for the job. Job failures are
//! recorded asynchronously into the operation's log by the completion
//! handler; the caller observes them through later status queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reachway_core::orchestrator::Orchestrator;
//! use reachway_core::persistence::SqlitePersistence;
//!
//! let persistence = Arc::new(SqlitePersistence::from_path(".data/reachway.db").await?);
//! let runner = Arc::new(reachway_jobs::ProcessRunner::from_env());
//!
//! let orchestrator = Orchestrator::builder()
//!     .persistence(persistence)
//!     .runner(runner)
//!     .build()?;
//!
//! let run = orchestrator.generate_analysis(project_id, scenario_id).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::error::CoreError;
use crate::operation::{ConflictGuard, EVENT_ERROR, Operation, OperationKind};
use crate::persistence::{Persistence, ProjectRecord, ScenarioRecord};
use crate::runner::{DispatchHandle, ServiceRunner, TaskError, TaskPayload, TaskRunner};

/// Project status required before any orchestration is permitted.
pub const PROJECT_STATUS_ACTIVE: &str = "active";

/// Status a scenario row is created with; the job moves it on from there.
pub const SCENARIO_STATUS_CREATING: &str = "creating";

/// Whether the orchestrator actually dispatches jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Dispatch a service runner for each started operation.
    #[default]
    Dispatch,
    /// Skip job dispatch entirely, leaving started operations in their
    /// `running` state for external assertions. An explicit seam - the
    /// orchestrator never consults ambient process state.
    DryRun,
}

/// Where a new scenario's road network comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioSource {
    /// Clone an existing scenario of the same project.
    Clone {
        /// The scenario to clone from.
        scenario_id: i64,
    },
    /// Import an uploaded road-network file.
    RoadNetwork {
        /// Name of the uploaded file in object storage.
        file_name: String,
    },
}

/// Result of a scenario-creating action.
#[derive(Debug)]
pub struct ScenarioCreation {
    /// The created scenario row, returned before the job runs.
    pub scenario: ScenarioRecord,
    /// The operation tracking the creation job.
    pub operation_id: i64,
    /// Handle for the dispatched job; `None` in dry-run mode.
    pub dispatch: Option<DispatchHandle>,
}

/// Result of an analysis-generating action.
#[derive(Debug)]
pub struct AnalysisRun {
    /// The operation tracking the analysis job.
    pub operation_id: i64,
    /// Handle for the dispatched job; `None` in dry-run mode.
    pub dispatch: Option<DispatchHandle>,
}

/// Builder for creating an [`Orchestrator`].
pub struct OrchestratorBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    runner: Option<Arc<dyn TaskRunner>>,
    dispatch_mode: DispatchMode,
    conflict_guard: ConflictGuard,
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("persistence", &self.persistence.as_ref().map(|_| "..."))
            .field("runner", &self.runner.as_ref().map(|r| r.runner_type()))
            .field("dispatch_mode", &self.dispatch_mode)
            .field("conflict_guard", &self.conflict_guard)
            .finish()
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            runner: None,
            dispatch_mode: DispatchMode::default(),
            conflict_guard: ConflictGuard::default(),
        }
    }
}

impl OrchestratorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence layer (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the task runner (required unless dispatch mode is
    /// [`DispatchMode::DryRun`]).
    pub fn runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Set the dispatch mode.
    ///
    /// Default: [`DispatchMode::Dispatch`]
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Set the conflict guard used by `Operation::start`.
    ///
    /// Default: [`ConflictGuard::Strict`]
    pub fn conflict_guard(mut self, guard: ConflictGuard) -> Self {
        self.conflict_guard = guard;
        self
    }

    /// Build the orchestrator.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> anyhow::Result<Orchestrator> {
        let persistence = self
            .persistence
            .ok_or_else(|| anyhow::anyhow!("persistence is required"))?;

        let mode = match self.dispatch_mode {
            DispatchMode::DryRun => Mode::DryRun,
            DispatchMode::Dispatch => {
                let runner = self.runner.ok_or_else(|| {
                    anyhow::anyhow!("runner is required unless dispatch mode is DryRun")
                })?;
                Mode::Dispatch(runner)
            }
        };

        Ok(Orchestrator {
            persistence,
            mode,
            conflict_guard: self.conflict_guard,
        })
    }
}

/// Internal dispatch state: a runner is only held when jobs actually run.
enum Mode {
    Dispatch(Arc<dyn TaskRunner>),
    DryRun,
}

/// Route-level coordinator for scenario and analysis actions.
pub struct Orchestrator {
    persistence: Arc<dyn Persistence>,
    mode: Mode,
    conflict_guard: ConflictGuard,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            Mode::Dispatch(runner) => runner.runner_type(),
            Mode::DryRun => "dry-run",
        };
        f.debug_struct("Orchestrator")
            .field("persistence", &"...")
            .field("mode", &mode)
            .field("conflict_guard", &self.conflict_guard)
            .finish()
    }
}

impl Orchestrator {
    /// Create a new builder for configuring an orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Create a scenario and dispatch its creation job.
    ///
    /// Returns the created scenario row immediately; the job fills in the
    /// road network asynchronously and finalizes the operation itself.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ProjectNotFound`] / [`CoreError::InvalidProjectState`]
    ///   if the project is missing or not active
    /// - [`CoreError::ScenarioNotFound`] / [`CoreError::ValidationError`] if
    ///   a clone source is missing or belongs to another project
    /// - [`CoreError::OperationConflict`] if a creation run is already active
    #[instrument(skip(self, source))]
    pub async fn create_scenario(
        &self,
        project_id: i64,
        name: &str,
        source: ScenarioSource,
    ) -> Result<ScenarioCreation, CoreError> {
        // 1. Validate inputs
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError {
                field: "name".to_string(),
                message: "scenario name must not be empty".to_string(),
            });
        }

        // 2. Project must exist and permit orchestration
        self.require_active_project(project_id).await?;

        // 3. Validate the road-network source
        match &source {
            ScenarioSource::Clone { scenario_id } => {
                self.require_project_scenario(project_id, *scenario_id)
                    .await?;
            }
            ScenarioSource::RoadNetwork { file_name } => {
                if file_name.trim().is_empty() {
                    return Err(CoreError::ValidationError {
                        field: "road_network_file".to_string(),
                        message: "file name must not be empty".to_string(),
                    });
                }
            }
        }

        // 4. Create the scenario row the caller gets back
        let scenario = self
            .persistence
            .insert_scenario(project_id, name, SCENARIO_STATUS_CREATING)
            .await?;

        // 5. Conflict check, then start the operation
        self.ensure_no_active_operation(OperationKind::ScenarioCreate, project_id, scenario.id)
            .await?;
        let operation = Operation::start(
            self.persistence.clone(),
            OperationKind::ScenarioCreate,
            project_id,
            scenario.id,
            self.conflict_guard,
        )
        .await?;

        info!(
            scenario_id = scenario.id,
            operation_id = operation.id(),
            "Scenario created, creation job starting"
        );

        // 6. Dispatch and return without waiting
        let mut payload = TaskPayload::new(project_id, scenario.id, operation.id());
        match source {
            ScenarioSource::Clone { scenario_id } => {
                payload = payload.with_source_scenario(scenario_id);
            }
            ScenarioSource::RoadNetwork { file_name } => {
                payload = payload.with_road_network_file(file_name);
            }
        }
        let dispatch = self.dispatch(
            OperationKind::ScenarioCreate.as_str(),
            payload,
            operation.id(),
        );

        Ok(ScenarioCreation {
            scenario,
            operation_id: operation.id(),
            dispatch,
        })
    }

    /// Duplicate an existing scenario of the project.
    ///
    /// Derives the copy's name from the source and delegates into the
    /// creation flow with a clone source.
    #[instrument(skip(self))]
    pub async fn duplicate_scenario(
        &self,
        project_id: i64,
        source_scenario_id: i64,
    ) -> Result<ScenarioCreation, CoreError> {
        let source = self
            .require_project_scenario(project_id, source_scenario_id)
            .await?;

        let name = format!("{} (copy)", source.name);
        self.create_scenario(
            project_id,
            &name,
            ScenarioSource::Clone {
                scenario_id: source_scenario_id,
            },
        )
        .await
    }

    /// Start an accessibility analysis run for a scenario.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ProjectNotFound`] / [`CoreError::InvalidProjectState`]
    ///   if the project is missing or not active
    /// - [`CoreError::ScenarioNotFound`] / [`CoreError::ValidationError`] if
    ///   the scenario is missing or belongs to another project
    /// - [`CoreError::OperationConflict`] if an analysis run is already
    ///   active for the scenario
    #[instrument(skip(self))]
    pub async fn generate_analysis(
        &self,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<AnalysisRun, CoreError> {
        // 1. Validate external state
        self.require_active_project(project_id).await?;
        self.require_project_scenario(project_id, scenario_id)
            .await?;

        // 2. Conflict check, then start the operation
        self.ensure_no_active_operation(OperationKind::GenerateAnalysis, project_id, scenario_id)
            .await?;
        let operation = Operation::start(
            self.persistence.clone(),
            OperationKind::GenerateAnalysis,
            project_id,
            scenario_id,
            self.conflict_guard,
        )
        .await?;

        info!(operation_id = operation.id(), "Analysis run starting");

        // 3. Dispatch and return without waiting
        let payload = TaskPayload::new(project_id, scenario_id, operation.id());
        let dispatch = self.dispatch(
            OperationKind::GenerateAnalysis.as_str(),
            payload,
            operation.id(),
        );

        Ok(AnalysisRun {
            operation_id: operation.id(),
            dispatch,
        })
    }

    /// Fail with `OperationConflict` if an operation for the triple is
    /// started and not yet completed. A triple with no operations at all is
    /// not a conflict.
    async fn ensure_no_active_operation(
        &self,
        kind: OperationKind,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<(), CoreError> {
        match Operation::load_by_data(self.persistence.clone(), kind, project_id, scenario_id).await
        {
            Ok(operation) if operation.is_started() => Err(CoreError::OperationConflict {
                kind: kind.as_str().to_string(),
                project_id,
                scenario_id,
            }),
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn require_active_project(&self, project_id: i64) -> Result<ProjectRecord, CoreError> {
        let project = self
            .persistence
            .get_project(project_id)
            .await?
            .ok_or(CoreError::ProjectNotFound { project_id })?;

        if project.status != PROJECT_STATUS_ACTIVE {
            return Err(CoreError::InvalidProjectState {
                project_id,
                expected: PROJECT_STATUS_ACTIVE.to_string(),
                actual: project.status.clone(),
            });
        }

        Ok(project)
    }

    async fn require_project_scenario(
        &self,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<ScenarioRecord, CoreError> {
        let scenario = self
            .persistence
            .get_scenario(scenario_id)
            .await?
            .ok_or(CoreError::ScenarioNotFound { scenario_id })?;

        if scenario.project_id != project_id {
            return Err(CoreError::ValidationError {
                field: "scenario_id".to_string(),
                message: format!(
                    "scenario {} belongs to project {}, not {}",
                    scenario_id, scenario.project_id, project_id
                ),
            });
        }

        Ok(scenario)
    }

    /// Dispatch a service runner for the started operation, or skip in
    /// dry-run mode.
    fn dispatch(
        &self,
        task: &str,
        payload: TaskPayload,
        operation_id: i64,
    ) -> Option<DispatchHandle> {
        let runner = match &self.mode {
            Mode::DryRun => {
                info!(task, operation_id, "Dry run: skipping task dispatch");
                return None;
            }
            Mode::Dispatch(runner) => runner.clone(),
        };

        let persistence = self.persistence.clone();
        let handle = ServiceRunner::new(task, payload, runner)
            .on_complete(move |err| Self::record_completion(persistence, operation_id, err))
            .start();

        Some(handle)
    }

    /// Completion handler shared by all actions.
    ///
    /// On success the operation is left open - the job finalizes it through
    /// its own log writes. On failure an `error` entry is appended unless the
    /// operation is already closed, in which case the error is dropped to
    /// keep the closed audit record untouched.
    async fn record_completion(
        persistence: Arc<dyn Persistence>,
        operation_id: i64,
        err: Option<TaskError>,
    ) {
        let Some(err) = err else {
            debug!(operation_id, "Task succeeded; operation left to the job to finalize");
            return;
        };

        match Operation::load_by_id(persistence, operation_id).await {
            Ok(mut operation) => {
                if operation.is_completed() {
                    warn!(
                        operation_id,
                        error = %err,
                        "Dropping task error for already-completed operation"
                    );
                    return;
                }

                let data = serde_json::json!({ "error": err.to_string() });
                if let Err(log_err) = operation.log(EVENT_ERROR, Some(data)).await {
                    error!(
                        operation_id,
                        error = %log_err,
                        "Failed to record task error in operation log"
                    );
                }
            }
            Err(load_err) => {
                error!(
                    operation_id,
                    error = %load_err,
                    "Failed to load operation for error recording"
                );
            }
        }
    }
}
