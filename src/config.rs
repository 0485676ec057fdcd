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

//! TOML configuration.
//!
//! ```toml
//! [loans]
//! period_days = 14
//!
//! [journal]
//! enabled = true
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Days between the borrow date and the due date unless configured otherwise.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config")]
    Parse(#[from] toml::de::Error),
}

/// Top-level library configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Loan policy settings.
    #[serde(default)]
    pub loans: LoanConfig,

    /// Borrow/return event journal.
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoanConfig {
    #[serde(default = "default_period_days")]
    pub period_days: u32,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            period_days: default_period_days(),
        }
    }
}

fn default_period_days() -> u32 {
    DEFAULT_LOAN_PERIOD_DAYS
}

/// The journal queue is unbounded; a long-running process that never drains
/// it should turn it off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
        }
    }
}

fn default_journal_enabled() -> bool {
    true
}

impl LibraryConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }
}
