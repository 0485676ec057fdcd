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

//! Caller identity and capabilities.

use crate::LoanError;
use crate::base::BorrowerId;

/// The identity on whose behalf an operation runs.
///
/// The staff flag is the only capability the library checks; it gates the
/// overdue and borrower listings and returns on behalf of other borrowers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    borrower: BorrowerId,
    staff: bool,
}

impl Caller {
    pub fn member(borrower: BorrowerId) -> Self {
        Self {
            borrower,
            staff: false,
        }
    }

    pub fn staff(borrower: BorrowerId) -> Self {
        Self {
            borrower,
            staff: true,
        }
    }

    pub fn borrower(&self) -> BorrowerId {
        self.borrower
    }

    pub fn is_staff(&self) -> bool {
        self.staff
    }

    pub(crate) fn require_staff(&self) -> Result<(), LoanError> {
        if self.staff {
            Ok(())
        } else {
            Err(LoanError::StaffOnly)
        }
    }
}
