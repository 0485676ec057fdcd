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

//! # Library Loans
//!
//! This library tracks book loans for a small lending library: a catalog of
//! titles with copy counts, a ledger of borrow and return events, and the
//! availability and overdue views derived from them.
//!
//! ## Core Components
//!
//! - [`Library`]: Façade that borrows, returns and answers queries
//! - [`Catalog`]: Books indexed by ID and ISBN
//! - [`LoanLedger`]: Loan records and the borrow/return journal
//! - [`LoanPolicy`]: Capacity check and due-date rule
//! - [`LoanError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use library_loans::{BorrowerId, Caller, Library, LibraryConfig, LoanError, NewBook};
//!
//! let library = Library::new(&LibraryConfig::default());
//! let book = library
//!     .add_book(NewBook::new("Vidas Secas", "Graciliano Ramos", "9788501061027", 1))
//!     .unwrap();
//!
//! let alice = Caller::member(BorrowerId(1));
//! let loan = library.borrow(&alice, book.id()).unwrap();
//! assert_eq!(library.available_copies(book.id()).unwrap(), 0);
//!
//! // The only copy is out.
//! let bob = Caller::member(BorrowerId(2));
//! assert_eq!(library.borrow(&bob, book.id()), Err(LoanError::NoCopiesAvailable));
//!
//! library.return_loan(&alice, loan.id()).unwrap();
//! assert_eq!(library.available_copies(book.id()).unwrap(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! Books sit in a concurrent map, each behind its own mutex. A borrow checks
//! capacity and records the loan while holding that mutex, so borrows of
//! different books run in parallel and borrows of the same book serialize.

pub mod availability;
mod base;
pub mod book;
pub mod catalog;
mod clock;
pub mod config;
pub mod error;
mod identity;
pub mod ledger;
mod library;
pub mod loan;
mod policy;
mod request;

pub use availability::{Availability, available_copies};
pub use base::{BookId, BorrowerId, LoanId};
pub use book::{Book, BookUpdate, Isbn, NewBook};
pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, DEFAULT_LOAN_PERIOD_DAYS, JournalConfig, LibraryConfig, LoanConfig,
};
pub use error::{ErrorKind, LoanError};
pub use identity::Caller;
pub use ledger::{EventKind, LedgerEvent, LoanLedger};
pub use library::{Library, OverdueLoan, RemovedBook};
pub use loan::{Loan, LoanStatus, ReturnOutcome};
pub use policy::LoanPolicy;
pub use request::{LoanReceipt, LoanRequest};
