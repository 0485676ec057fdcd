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

//! Loan records.
//!
//! Implemented State Machine
//!
//! ```text
//!  borrow ──► Open ──return / force_return──► Closed
//! ```
//!
//! `Closed` is terminal. Borrowing the same title again creates a new loan.

use crate::LoanError;
use crate::base::{BookId, BorrowerId, LoanId};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Closed,
}

/// Result of a return request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The loan was open and is now closed.
    Returned,
    /// The loan was already closed; nothing changed.
    AlreadyReturned,
}

/// A book lent to a borrower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    id: LoanId,
    book_id: BookId,
    borrower: BorrowerId,
    borrowed_at: DateTime<FixedOffset>,
    due_date: NaiveDate,
    returned_at: Option<DateTime<FixedOffset>>,
}

impl Loan {
    /// Builds an open loan.
    ///
    /// # Errors
    ///
    /// [`LoanError::DueBeforeBorrowed`] if `due_date` precedes the calendar
    /// date of `borrowed_at`.
    pub fn new(
        id: LoanId,
        book_id: BookId,
        borrower: BorrowerId,
        borrowed_at: DateTime<FixedOffset>,
        due_date: NaiveDate,
    ) -> Result<Self, LoanError> {
        if due_date < borrowed_at.date_naive() {
            return Err(LoanError::DueBeforeBorrowed);
        }
        Ok(Self {
            id,
            book_id,
            borrower,
            borrowed_at,
            due_date,
            returned_at: None,
        })
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn borrower(&self) -> BorrowerId {
        self.borrower
    }

    pub fn borrowed_at(&self) -> DateTime<FixedOffset> {
        self.borrowed_at
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn returned_at(&self) -> Option<DateTime<FixedOffset>> {
        self.returned_at
    }

    pub fn status(&self) -> LoanStatus {
        match self.returned_at {
            None => LoanStatus::Open,
            Some(_) => LoanStatus::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Open and past its due date as of `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && today > self.due_date
    }

    /// Whole days past the due date as of `today`; zero when not overdue.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }

    /// Closes the loan. Only the first call records a timestamp.
    pub(crate) fn close(&mut self, at: DateTime<FixedOffset>) -> ReturnOutcome {
        if self.returned_at.is_some() {
            return ReturnOutcome::AlreadyReturned;
        }
        self.returned_at = Some(at);
        ReturnOutcome::Returned
    }

    /// Most recent borrow first, newest ID breaking ties.
    pub(crate) fn recent_first(a: &Loan, b: &Loan) -> Ordering {
        b.borrowed_at
            .cmp(&a.borrowed_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.status() {
            LoanStatus::Open => "on loan",
            LoanStatus::Closed => "returned",
        };
        write!(
            f,
            "loan {} of book {} to borrower {} ({})",
            self.id, self.book_id, self.borrower, state
        )
    }
}

impl Serialize for Loan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Loan", 7)?;
        state.serialize_field("loan", &self.id)?;
        state.serialize_field("book", &self.book_id)?;
        state.serialize_field("borrower", &self.borrower)?;
        state.serialize_field("borrowed_at", &self.borrowed_at)?;
        state.serialize_field("due_date", &self.due_date)?;
        state.serialize_field("returned_at", &self.returned_at)?;
        state.serialize_field("status", &self.status())?;
        state.end()
    }
}
