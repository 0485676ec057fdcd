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

//! Loan policy: whether a borrow may proceed and when it falls due.

use crate::LoanError;
use crate::config::{DEFAULT_LOAN_PERIOD_DAYS, LoanConfig};
use chrono::{DateTime, Days, FixedOffset, NaiveDate};

/// Fixed-period lending rules.
///
/// There is no grace period, renewal or fine; a loan is due a constant
/// number of days after the calendar date it was borrowed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    period_days: u32,
}

impl LoanPolicy {
    pub fn new(period_days: u32) -> Self {
        Self { period_days }
    }

    pub fn period_days(&self) -> u32 {
        self.period_days
    }

    /// Rejects a borrow once every copy is out.
    pub fn check_capacity(&self, total_copies: u32, open_loans: u32) -> Result<(), LoanError> {
        if open_loans >= total_copies {
            return Err(LoanError::NoCopiesAvailable);
        }
        Ok(())
    }

    /// Due date for a loan starting at `borrowed_at`.
    pub fn due_date(&self, borrowed_at: DateTime<FixedOffset>) -> Result<NaiveDate, LoanError> {
        borrowed_at
            .date_naive()
            .checked_add_days(Days::new(u64::from(self.period_days)))
            .ok_or(LoanError::DateOutOfRange)
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOAN_PERIOD_DAYS)
    }
}

impl From<&LoanConfig> for LoanPolicy {
    fn from(config: &LoanConfig) -> Self {
        Self::new(config.period_days)
    }
}
