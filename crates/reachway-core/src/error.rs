// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for reachway-core.
//!
//! Provides a unified error type with stable string codes that the route
//! layer can map onto client-visible responses.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during orchestration and persistence.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// No operation matched the requested id or (kind, project, scenario) triple.
    ///
    /// Orchestrators treat a triple miss as "no conflicting run", not a failure.
    OperationNotFound {
        /// Description of the lookup that missed (id or triple).
        lookup: String,
    },

    /// An operation for the same (kind, project, scenario) triple is still running.
    OperationConflict {
        /// The operation kind.
        kind: String,
        /// The project id.
        project_id: i64,
        /// The scenario id.
        scenario_id: i64,
    },

    /// Project was not found.
    ProjectNotFound {
        /// The project id that was not found.
        project_id: i64,
    },

    /// Scenario was not found.
    ScenarioNotFound {
        /// The scenario id that was not found.
        scenario_id: i64,
    },

    /// Project is in a status that does not permit the requested action.
    InvalidProjectState {
        /// The project id.
        project_id: i64,
        /// The status required for the action.
        expected: String,
        /// The project's actual status.
        actual: String,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the stable error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OperationNotFound { .. } => "OPERATION_NOT_FOUND",
            Self::OperationConflict { .. } => "OPERATION_CONFLICT",
            Self::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            Self::ScenarioNotFound { .. } => "SCENARIO_NOT_FOUND",
            Self::InvalidProjectState { .. } => "INVALID_PROJECT_STATE",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    /// True if this error is a not-found miss (operation, project, or scenario).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OperationNotFound { .. }
                | Self::ProjectNotFound { .. }
                | Self::ScenarioNotFound { .. }
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperationNotFound { lookup } => {
                write!(f, "Operation not found for {}", lookup)
            }
            Self::OperationConflict {
                kind,
                project_id,
                scenario_id,
            } => {
                write!(
                    f,
                    "Operation '{}' already running for project {} scenario {}",
                    kind, project_id, scenario_id
                )
            }
            Self::ProjectNotFound { project_id } => {
                write!(f, "Project {} not found", project_id)
            }
            Self::ScenarioNotFound { scenario_id } => {
                write!(f, "Scenario {} not found", scenario_id)
            }
            Self::InvalidProjectState {
                project_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Project {} is in invalid state: expected '{}', got '{}'",
                    project_id, expected, actual
                )
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}
