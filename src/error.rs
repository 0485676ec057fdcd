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

//! Error types for catalog and loan operations.

use thiserror::Error;

/// Coarse classification of a [`LoanError`].
///
/// None of these are retried by the library; callers decide what to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    CapacityExceeded,
    ConstraintViolation,
}

/// Catalog and loan processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    /// Referenced book does not exist
    #[error("book not found")]
    BookNotFound,

    /// Referenced loan does not exist
    #[error("loan not found")]
    LoanNotFound,

    /// Borrower does not own the referenced loan
    #[error("borrower does not own this loan")]
    NotLoanOwner,

    /// Operation requires the staff capability
    #[error("operation restricted to staff")]
    StaffOnly,

    /// Every copy of the book is on loan
    #[error("no copies available for loan")]
    NoCopiesAvailable,

    /// Due date precedes the calendar date of the borrow
    #[error("due date is earlier than the borrow date")]
    DueBeforeBorrowed,

    /// Another book already uses this ISBN
    #[error("duplicate ISBN")]
    DuplicateIsbn,

    /// ISBN is not exactly 13 digits
    #[error("invalid ISBN (expected 13 digits)")]
    InvalidIsbn,

    /// Required text field is blank
    #[error("{0} must not be blank")]
    BlankField(&'static str),

    /// Text field exceeds the storage limit
    #[error("{0} is too long")]
    FieldTooLong(&'static str),

    /// Date arithmetic left the representable calendar range
    #[error("date out of range")]
    DateOutOfRange,
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BookNotFound | Self::LoanNotFound => ErrorKind::NotFound,
            Self::NotLoanOwner | Self::StaffOnly => ErrorKind::Unauthorized,
            Self::NoCopiesAvailable => ErrorKind::CapacityExceeded,
            Self::DueBeforeBorrowed
            | Self::DuplicateIsbn
            | Self::InvalidIsbn
            | Self::BlankField(_)
            | Self::FieldTooLong(_)
            | Self::DateOutOfRange => ErrorKind::ConstraintViolation,
        }
    }
}
