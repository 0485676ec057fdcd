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

//! Availability is derived from the ledger on every read, never stored.

use crate::base::BookId;
use crate::book::Book;
use serde::Serialize;

/// Copies that can still be lent: `total - open`, floored at zero.
///
/// The floor matters when a book's copy count is reduced while more loans
/// than the new count are still open.
pub fn available_copies(total_copies: u32, open_loans: u32) -> u32 {
    total_copies.saturating_sub(open_loans)
}

/// Point-in-time availability of one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub book: BookId,
    pub isbn: String,
    pub title: String,
    pub total: u32,
    pub on_loan: u32,
    pub available: u32,
}

impl Availability {
    pub(crate) fn of(book: &Book, open_loans: u32) -> Self {
        Self {
            book: book.id(),
            isbn: book.isbn().to_string(),
            title: book.title().to_owned(),
            total: book.total_copies(),
            on_loan: open_loans,
            available: available_copies(book.total_copies(), open_loans),
        }
    }
}
