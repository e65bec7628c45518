// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! Loads tunables from environment variables, falling back to defaults.

use std::env;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times a unit of work is re-run after losing an optimistic
    /// commit before giving up with a conflict.
    pub max_commit_attempts: u32,

    /// Decimal places of the smallest currency unit, used when splitting an
    /// amount into installments.
    pub money_scale: u32,
}

impl EngineConfig {
    pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 8;
    pub const DEFAULT_MONEY_SCALE: u32 = 2;

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_commit_attempts = read_var("LEDGER_MAX_COMMIT_ATTEMPTS", Self::DEFAULT_MAX_COMMIT_ATTEMPTS)?;
        if max_commit_attempts == 0 {
            return Err(ConfigError::InvalidValue("LEDGER_MAX_COMMIT_ATTEMPTS"));
        }

        let money_scale = read_var("LEDGER_MONEY_SCALE", Self::DEFAULT_MONEY_SCALE)?;
        if money_scale > 8 {
            return Err(ConfigError::InvalidValue("LEDGER_MONEY_SCALE"));
        }

        Ok(Self {
            max_commit_attempts,
            money_scale,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: Self::DEFAULT_MAX_COMMIT_ATTEMPTS,
            money_scale: Self::DEFAULT_MONEY_SCALE,
        }
    }
}

fn read_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue(name)),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
