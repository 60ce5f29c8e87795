// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reachway Jobs - Task Execution Substrate
//!
//! Implementations of the [`TaskRunner`](reachway_core::runner::TaskRunner)
//! contract defined by `reachway-core`. The core is agnostic to how a task
//! actually executes; this crate provides the two production substrates:
//!
//! - [`ProcessRunner`]: runs a configured worker program as a local
//!   subprocess (`program <task> <payload-json>`)
//! - [`DockerRunner`]: runs the task inside a container
//!   (`docker run --rm <image> <task> <payload-json>`)
//!
//! Both translate spawn failures and non-zero exits into
//! [`TaskError`](reachway_core::runner::TaskError), so a job that dies before
//! making any progress still produces the completion signal the orchestration
//! layer depends on. The job process itself owns all domain work (mutating
//! scenario rows, writing result files); its only contract with the core is
//! the exit status.

#![deny(missing_docs)]

/// Docker CLI based task runner.
pub mod docker;

/// Subprocess based task runner.
pub mod process;

pub use docker::{DockerRunner, DockerRunnerConfig};
pub use process::{ProcessRunner, ProcessRunnerConfig};

/// Condense raw stderr bytes into a short, user-surfaceable preview.
///
/// Keeps the first ten non-noise lines and caps the result at 2000 bytes.
pub(crate) fn stderr_preview(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            !lower.contains("warning:") && !line.trim().is_empty()
        })
        .take(10)
        .collect();

    let preview = lines.join("\n");
    if preview.len() > 2000 {
        format!("{}...", &preview[..2000])
    } else {
        preview
    }
}
