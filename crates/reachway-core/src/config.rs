// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use crate::orchestrator::DispatchMode;

/// Reachway core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// When true, orchestrators skip job dispatch entirely
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `REACHWAY_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `REACHWAY_DRY_RUN`: skip job dispatch when `true` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("REACHWAY_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("REACHWAY_DATABASE_URL"))?;

        let dry_run = match std::env::var("REACHWAY_DRY_RUN") {
            Err(_) => false,
            Ok(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid(
                        "REACHWAY_DRY_RUN",
                        "must be a boolean value",
                    ));
                }
            },
        };

        Ok(Self {
            database_url,
            dry_run,
        })
    }

    /// The dispatch mode implied by this configuration.
    pub fn dispatch_mode(&self) -> DispatchMode {
        if self.dry_run {
            DispatchMode::DryRun
        } else {
            DispatchMode::Dispatch
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
