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

//! Mutating commands accepted by [`Library::process`](crate::Library::process).
//!
//! Reads never go through this type, so a borrow or return can only happen
//! when a caller deliberately issues one of these commands.

use crate::base::{BookId, LoanId};
use crate::loan::Loan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoanRequest {
    /// Lend one copy of `book` to the caller.
    Borrow { book: BookId },
    /// Return one of the caller's own loans.
    Return { loan: LoanId },
    /// Staff return on behalf of any borrower.
    ForceReturn { loan: LoanId },
}

/// What a successful request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanReceipt {
    Borrowed(Loan),
    Returned(Loan),
    /// The loan was closed before this request; nothing changed.
    AlreadyReturned(Loan),
}

impl LoanReceipt {
    pub fn loan(&self) -> &Loan {
        match self {
            Self::Borrowed(loan) | Self::Returned(loan) | Self::AlreadyReturned(loan) => loan,
        }
    }
}
