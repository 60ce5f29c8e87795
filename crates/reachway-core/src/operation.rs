// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation lifecycle tracking.
//!
//! An [`Operation`] is the persisted record of one long-running task tied to a
//! (kind, project, scenario) triple. Its lifecycle is an append-only log:
//! `start()` writes the identity row and the first `start` entry, `log()`
//! appends progress entries, and `finish()` (or an `error` entry written by a
//! failure handler) closes it. Status is always derived from the ordered log
//! sequence, giving a free audit trail - there is no authoritative status
//! column to drift out of sync.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::CoreError;
use crate::persistence::{OperationLogRecord, OperationRecord, Persistence};

/// First entry of every operation's log.
pub const EVENT_START: &str = "start";

/// Terminal entry for a successful run.
pub const EVENT_FINISH: &str = "finish";

/// Terminal entry for a failed run.
pub const EVENT_ERROR: &str = "error";

/// True if the event tag closes an operation.
pub fn is_terminal_event(event: &str) -> bool {
    matches!(event, EVENT_FINISH | EVENT_ERROR)
}

/// The kinds of long-running task an operation can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OperationKind {
    /// Scenario creation (blank, clone, or road-network import).
    ScenarioCreate,
    /// Accessibility analysis generation.
    GenerateAnalysis,
    /// Vector tile generation for result display.
    GenerateVectorTiles,
}

impl OperationKind {
    /// The kind tag stored in the database and used in conflict triples.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScenarioCreate => "scenario-create",
            Self::GenerateAnalysis => "generate-analysis",
            Self::GenerateVectorTiles => "generate-vector-tiles",
        }
    }

    /// Parse a stored kind tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scenario-create" => Some(Self::ScenarioCreate),
            "generate-analysis" => Some(Self::GenerateAnalysis),
            "generate-vector-tiles" => Some(Self::GenerateVectorTiles),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation status, derived from the log sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Started and not yet closed.
    Running,
    /// Closed by a `finish` entry.
    Complete,
    /// Closed by an `error` entry.
    Error,
}

impl OperationStatus {
    /// Derive the status from an ordered log slice.
    ///
    /// Pure function over the entries: an `error` entry wins, otherwise a
    /// `finish` entry closes the operation, otherwise it is running. An empty
    /// slice is the degenerate `Running` (a persisted operation always has a
    /// `start` entry because [`Operation::start`] writes it in the same call).
    pub fn from_log(entries: &[OperationLogRecord]) -> Self {
        let mut status = Self::Running;
        for entry in entries {
            match entry.event.as_str() {
                EVENT_ERROR => return Self::Error,
                EVENT_FINISH => status = Self::Complete,
                _ => {}
            }
        }
        status
    }

    /// True for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Status tag for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// How `start()` defends the one-active-operation-per-triple invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictGuard {
    /// The insert sets the active marker; the partial unique index makes a
    /// concurrent duplicate start fail with `OperationConflict`.
    #[default]
    Strict,
    /// No marker; only the orchestrator's check-then-act applies, preserving
    /// the original race window between check and start.
    Legacy,
}

/// Handle for one persisted operation.
///
/// Holds the persistence backend, the identity row, and a cached copy of the
/// log. Mutating calls refresh the cache; call [`reload`](Self::reload) to
/// pick up entries written by other parties (e.g. the job process).
pub struct Operation {
    persistence: Arc<dyn Persistence>,
    record: OperationRecord,
    kind: OperationKind,
    log: Vec<OperationLogRecord>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.record.id)
            .field("kind", &self.kind)
            .field("project_id", &self.record.project_id)
            .field("scenario_id", &self.record.scenario_id)
            .field("log_len", &self.log.len())
            .finish()
    }
}

impl Operation {
    /// Create and persist a new operation, writing the identity row and the
    /// first `start` log entry.
    ///
    /// With [`ConflictGuard::Strict`] a concurrent start for the same triple
    /// fails with [`CoreError::OperationConflict`]. With
    /// [`ConflictGuard::Legacy`] the caller must have performed the
    /// check-then-act conflict check itself.
    pub async fn start(
        persistence: Arc<dyn Persistence>,
        kind: OperationKind,
        project_id: i64,
        scenario_id: i64,
        guard: ConflictGuard,
    ) -> Result<Self, CoreError> {
        let now = Utc::now();
        let active = matches!(guard, ConflictGuard::Strict);

        let id = persistence
            .insert_operation(kind.as_str(), project_id, scenario_id, active, now)
            .await?;

        persistence
            .append_log_entry(id, EVENT_START, None, now)
            .await?;

        debug!(
            operation_id = id,
            kind = %kind,
            project_id,
            scenario_id,
            "Operation started"
        );

        let log = persistence.get_log(id).await?;
        Ok(Self {
            record: OperationRecord {
                id,
                kind: kind.as_str().to_string(),
                project_id,
                scenario_id,
                active,
                created_at: now,
            },
            kind,
            log,
            persistence,
        })
    }

    /// Load the most recent operation for a (kind, project, scenario) triple.
    ///
    /// Fails with [`CoreError::OperationNotFound`] if no operation exists for
    /// the triple. Callers performing conflict checks must treat that as "no
    /// conflicting run", not as a hard error.
    pub async fn load_by_data(
        persistence: Arc<dyn Persistence>,
        kind: OperationKind,
        project_id: i64,
        scenario_id: i64,
    ) -> Result<Self, CoreError> {
        let record = persistence
            .find_latest_operation(kind.as_str(), project_id, scenario_id)
            .await?
            .ok_or_else(|| CoreError::OperationNotFound {
                lookup: format!(
                    "kind '{}' project {} scenario {}",
                    kind.as_str(),
                    project_id,
                    scenario_id
                ),
            })?;

        Self::from_record(persistence, record).await
    }

    /// Load an operation by id.
    ///
    /// Fails with [`CoreError::OperationNotFound`] if the id is unknown.
    pub async fn load_by_id(persistence: Arc<dyn Persistence>, id: i64) -> Result<Self, CoreError> {
        let record = persistence.get_operation(id).await?.ok_or_else(|| {
            CoreError::OperationNotFound {
                lookup: format!("id {}", id),
            }
        })?;

        Self::from_record(persistence, record).await
    }

    async fn from_record(
        persistence: Arc<dyn Persistence>,
        record: OperationRecord,
    ) -> Result<Self, CoreError> {
        let kind =
            OperationKind::parse(&record.kind).ok_or_else(|| CoreError::DatabaseError {
                operation: "load_operation".to_string(),
                details: format!(
                    "unknown operation kind '{}' for operation {}",
                    record.kind, record.id
                ),
            })?;

        let log = persistence.get_log(record.id).await?;
        Ok(Self {
            persistence,
            record,
            kind,
            log,
        })
    }

    /// Append a log entry to this operation. Chainable.
    ///
    /// `event` is a free-form tag; appending [`EVENT_FINISH`] or
    /// [`EVENT_ERROR`] closes the operation and clears the strict-mode
    /// conflict marker. The data layer does not reject appends after a
    /// terminal entry; closed operations are the caller's contract to respect.
    pub async fn log(
        &mut self,
        event: &str,
        data: Option<serde_json::Value>,
    ) -> Result<&mut Self, CoreError> {
        if event.is_empty() {
            return Err(CoreError::ValidationError {
                field: "event".to_string(),
                message: "event tag must not be empty".to_string(),
            });
        }

        let serialized = match &data {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        let now = Utc::now();
        self.persistence
            .append_log_entry(self.record.id, event, serialized.as_deref(), now)
            .await?;

        if is_terminal_event(event) {
            self.persistence.clear_active_marker(self.record.id).await?;
        }

        debug!(operation_id = self.record.id, event, "Operation log appended");

        self.log = self.persistence.get_log(self.record.id).await?;
        Ok(self)
    }

    /// Close the operation successfully by appending the terminal `finish`
    /// entry. After this, [`is_completed`](Self::is_completed) is true.
    pub async fn finish(
        &mut self,
        data: Option<serde_json::Value>,
    ) -> Result<&mut Self, CoreError> {
        self.log(EVENT_FINISH, data).await
    }

    /// Refresh the cached identity row and log from storage.
    pub async fn reload(&mut self) -> Result<(), CoreError> {
        let record = self
            .persistence
            .get_operation(self.record.id)
            .await?
            .ok_or_else(|| CoreError::OperationNotFound {
                lookup: format!("id {}", self.record.id),
            })?;

        self.log = self.persistence.get_log(record.id).await?;
        self.record = record;
        Ok(())
    }

    /// Derived status over the cached log.
    pub fn status(&self) -> OperationStatus {
        OperationStatus::from_log(&self.log)
    }

    /// True if the log contains a `start` entry and no terminal entry yet.
    pub fn is_started(&self) -> bool {
        self.log.iter().any(|e| e.event == EVENT_START) && !self.is_completed()
    }

    /// True if a terminal entry (`finish` or `error`) has been logged.
    pub fn is_completed(&self) -> bool {
        self.status().is_terminal()
    }

    /// The operation's database-assigned id.
    pub fn id(&self) -> i64 {
        self.record.id
    }

    /// The operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The project this operation belongs to.
    pub fn project_id(&self) -> i64 {
        self.record.project_id
    }

    /// The scenario this operation belongs to.
    pub fn scenario_id(&self) -> i64 {
        self.record.scenario_id
    }

    /// The cached log entries, oldest first.
    pub fn log_entries(&self) -> &[OperationLogRecord] {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(event: &str) -> OperationLogRecord {
        OperationLogRecord {
            id: 0,
            operation_id: 1,
            event: event.to_string(),
            data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            OperationKind::ScenarioCreate,
            OperationKind::GenerateAnalysis,
            OperationKind::GenerateVectorTiles,
        ] {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::parse("unknown-kind"), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(
            OperationKind::GenerateAnalysis.to_string(),
            "generate-analysis"
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(is_terminal_event(EVENT_FINISH));
        assert!(is_terminal_event(EVENT_ERROR));
        assert!(!is_terminal_event(EVENT_START));
        assert!(!is_terminal_event("road-network-import"));
    }

    #[test]
    fn test_status_from_empty_log() {
        assert_eq!(OperationStatus::from_log(&[]), OperationStatus::Running);
    }

    #[test]
    fn test_status_from_start_only() {
        let log = vec![entry(EVENT_START)];
        let status = OperationStatus::from_log(&log);
        assert_eq!(status, OperationStatus::Running);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_status_with_progress_entries() {
        let log = vec![entry(EVENT_START), entry("road-network-import")];
        assert_eq!(OperationStatus::from_log(&log), OperationStatus::Running);
    }

    #[test]
    fn test_status_finished() {
        let log = vec![entry(EVENT_START), entry("progress"), entry(EVENT_FINISH)];
        let status = OperationStatus::from_log(&log);
        assert_eq!(status, OperationStatus::Complete);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_status_errored() {
        let log = vec![entry(EVENT_START), entry(EVENT_ERROR)];
        let status = OperationStatus::from_log(&log);
        assert_eq!(status, OperationStatus::Error);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_error_wins_over_finish() {
        // Should not occur (at most one terminal entry), but derivation
        // must be deterministic if it ever does.
        let log = vec![entry(EVENT_START), entry(EVENT_ERROR), entry(EVENT_FINISH)];
        assert_eq!(OperationStatus::from_log(&log), OperationStatus::Error);
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(OperationStatus::Running.as_str(), "running");
        assert_eq!(OperationStatus::Complete.as_str(), "complete");
        assert_eq!(OperationStatus::Error.as_str(), "error");
    }

    #[test]
    fn test_conflict_guard_default_is_strict() {
        assert_eq!(ConflictGuard::default(), ConflictGuard::Strict);
    }
}
