// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reachway Core - Operation Orchestration Engine
//!
//! This crate is the coordination core of a project-management backend for
//! road-network accessibility analysis. It tracks asynchronous, long-running,
//! externally-executed jobs (scenario creation, analysis generation) tied to a
//! project/scenario pair, persists their lifecycle as an append-only log, and
//! guarantees non-overlapping execution per resource.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Route Layer (external)                           │
//! │                 (HTTP validation, pagination, presign)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Orchestrators                                   │
//! │       validate → conflict check → start Operation → dispatch job         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ start / log / finish                         │ dispatch
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │      Operation        │                    │       ServiceRunner         │
//! │  (append-only log,    │◄───────────────────│  (one job, one completion   │
//! │   derived status)     │   error recording  │   signal, never reused)     │
//! └───────────────────────┘                    └─────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │  SQLite / PostgreSQL  │                    │   TaskRunner substrate      │
//! │   (operation log)     │                    │ (subprocess, Docker, mock)  │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Operation Lifecycle
//!
//! ```text
//!      ┌─────────┐  start()   ┌─────────┐
//!      │ (none)  │───────────►│ RUNNING │──────────┐
//!      └─────────┘            └────┬────┘          │
//!                                  │               │
//!                          finish()│      error entry (job failure)
//!                                  │               │
//!                                  ▼               ▼
//!                            ┌──────────┐    ┌──────────┐
//!                            │ COMPLETE │    │  ERROR   │
//!                            └──────────┘    └──────────┘
//! ```
//!
//! Status is never stored: it is derived from the ordered log sequence, so the
//! log doubles as a permanent audit trail. The first entry is always `start`;
//! a `finish` or `error` entry closes the operation.
//!
//! # Conflict Semantics
//!
//! At most one operation per (kind, project, scenario) triple may be running.
//! Orchestrators check before starting; with the default
//! [`ConflictGuard::Strict`](operation::ConflictGuard) the start itself is
//! additionally backed by a partial unique index, closing the race between
//! check and start. [`ConflictGuard::Legacy`](operation::ConflictGuard)
//! preserves the unguarded check-then-act window for compatibility.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `REACHWAY_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `REACHWAY_DRY_RUN` | No | `false` | Skip job dispatch (operations stay running) |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types with stable string codes
//! - [`migrations`]: Embedded database migrations for both backends
//! - [`operation`]: Operation lifecycle, kinds, and derived status
//! - [`orchestrator`]: Route-level action coordinators
//! - [`persistence`]: Persistence trait and SQLite/PostgreSQL backends
//! - [`runner`]: Task runner seam, service-runner supervision, mock

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for core operations with stable string codes.
pub mod error;

/// Embedded database migrations for SQLite and PostgreSQL.
pub mod migrations;

/// Operation lifecycle tracking with log-derived status.
pub mod operation;

/// Orchestrators sequencing validation, conflict checks, and dispatch.
pub mod orchestrator;

/// Persistence trait and database backends.
pub mod persistence;

/// Job execution seam and service-runner supervision.
pub mod runner;
