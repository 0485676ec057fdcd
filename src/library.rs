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

//! Library façade.
//!
//! The [`Library`] ties the catalog, the loan ledger, the loan policy and a
//! clock together. It is the only type most callers need.
//!
//! # Borrowing
//!
//! A borrow runs its capacity check and the creation of the loan while
//! holding the book's lock, so concurrent borrows of the last copy cannot
//! both succeed.
//!
//! # Thread Safety
//!
//! All operations take `&self`; share the library through an `Arc` or by
//! reference across scoped threads.

use crate::availability::{Availability, available_copies};
use crate::base::{BookId, BorrowerId, LoanId};
use crate::book::{Book, BookUpdate, Isbn, NewBook};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::LibraryConfig;
use crate::identity::Caller;
use crate::ledger::{EventKind, LedgerEvent, LoanLedger};
use crate::loan::{Loan, ReturnOutcome};
use crate::policy::LoanPolicy;
use crate::request::{LoanReceipt, LoanRequest};
use crate::LoanError;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An open loan past its due date, with the book it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueLoan {
    pub loan: Loan,
    pub book: Book,
}

/// A book removed from the catalog together with its loans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedBook {
    pub book: Book,
    pub loans_removed: usize,
}

/// Book catalog and loan ledger under one loan policy.
///
/// # Invariants
///
/// - Availability is derived from open loans on every read, never stored.
/// - A book never has more open loans than copies, unless its copy count was
///   reduced afterwards.
/// - A loan closes at most once.
pub struct Library {
    catalog: Catalog,
    ledger: LoanLedger,
    policy: LoanPolicy,
    clock: Arc<dyn Clock>,
}

impl Library {
    /// Creates an empty library reading the system clock.
    pub fn new(config: &LibraryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &LibraryConfig, clock: Arc<dyn Clock>) -> Self {
        Library {
            catalog: Catalog::new(),
            ledger: LoanLedger::with_journal(config.journal.enabled),
            policy: LoanPolicy::from(&config.loans),
            clock,
        }
    }

    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // === Catalog ===

    pub fn add_book(&self, new: NewBook) -> Result<Book, LoanError> {
        let book = self.catalog.add(new, self.clock.now())?;
        info!(book = %book.id(), isbn = %book.isbn(), title = book.title(), "book added");
        Ok(book)
    }

    /// Edits book metadata.
    ///
    /// Lowering the copy count below the number of open loans is allowed;
    /// availability then reads zero until enough loans are returned.
    pub fn update_book(&self, id: BookId, update: BookUpdate) -> Result<Book, LoanError> {
        let book = self.catalog.update(id, update)?;
        let open = self.ledger.open_count(id);
        if open > book.total_copies() {
            warn!(
                book = %id,
                open,
                total = book.total_copies(),
                "copy count below open loans"
            );
        }
        info!(book = %id, "book updated");
        Ok(book)
    }

    /// Removes a book and every loan that references it.
    pub fn remove_book(&self, id: BookId) -> Result<RemovedBook, LoanError> {
        let book = self.catalog.remove(id)?;
        let loans_removed = self.ledger.purge_book(id);
        if loans_removed > 0 {
            warn!(book = %id, loans_removed, "book removed with its loans");
        } else {
            info!(book = %id, "book removed");
        }
        Ok(RemovedBook {
            book,
            loans_removed,
        })
    }

    pub fn book(&self, id: BookId) -> Option<Book> {
        self.catalog.get(id)
    }

    pub fn find_by_isbn(&self, isbn: &Isbn) -> Option<Book> {
        self.catalog.find_by_isbn(isbn)
    }

    /// Every book with its current availability, ordered by title.
    pub fn books(&self) -> Vec<Availability> {
        self.catalog
            .books()
            .iter()
            .map(|book| Availability::of(book, self.ledger.open_count(book.id())))
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<Book> {
        self.catalog.search(query)
    }

    // === Availability ===

    pub fn available_copies(&self, id: BookId) -> Result<u32, LoanError> {
        self.catalog.with_book(id, |book| {
            Ok(available_copies(book.total_copies(), self.ledger.open_count(id)))
        })
    }

    pub fn availability(&self, id: BookId) -> Result<Availability, LoanError> {
        self.catalog
            .with_book(id, |book| Ok(Availability::of(book, self.ledger.open_count(id))))
    }

    // === Loans ===

    /// Lends one copy of a book to the caller.
    ///
    /// # Errors
    ///
    /// - [`LoanError::BookNotFound`] - No such book.
    /// - [`LoanError::NoCopiesAvailable`] - Every copy is on loan.
    /// - [`LoanError::DateOutOfRange`] - The due date cannot be represented.
    pub fn borrow(&self, caller: &Caller, book_id: BookId) -> Result<Loan, LoanError> {
        let now = self.clock.now();
        let result = self.catalog.with_book(book_id, |book| {
            let open = self.ledger.open_count(book_id);
            self.policy.check_capacity(book.total_copies(), open)?;
            let due_date = self.policy.due_date(now)?;
            self.ledger.open(book_id, caller.borrower(), now, due_date)
        });

        match &result {
            Ok(loan) => info!(
                loan = %loan.id(),
                book = %book_id,
                borrower = %caller.borrower(),
                due = %loan.due_date(),
                "book borrowed"
            ),
            Err(e) => warn!(book = %book_id, borrower = %caller.borrower(), "borrow rejected: {e}"),
        }
        result
    }

    /// Returns one of the caller's own loans.
    ///
    /// Returning an already closed loan is not an error; the receipt says
    /// [`LoanReceipt::AlreadyReturned`] and nothing changes.
    ///
    /// # Errors
    ///
    /// - [`LoanError::LoanNotFound`] - No such loan.
    /// - [`LoanError::NotLoanOwner`] - The loan belongs to someone else.
    pub fn return_loan(&self, caller: &Caller, loan_id: LoanId) -> Result<LoanReceipt, LoanError> {
        let borrower = caller.borrower();
        self.close(loan_id, EventKind::Returned, |loan| {
            if loan.borrower() == borrower {
                Ok(())
            } else {
                Err(LoanError::NotLoanOwner)
            }
        })
    }

    /// Staff return on behalf of any borrower.
    pub fn force_return(&self, caller: &Caller, loan_id: LoanId) -> Result<LoanReceipt, LoanError> {
        caller.require_staff()?;
        self.close(loan_id, EventKind::ForceReturned, |_| Ok(()))
    }

    /// Staff bulk return. Every listed loan that is still open is closed with
    /// the same timestamp; already closed loans are skipped.
    ///
    /// Returns how many loans were actually closed. Unknown loan IDs fail the
    /// whole call before anything is closed. A loan that disappears after
    /// that check, because its book was removed concurrently, is skipped.
    pub fn mark_returned(&self, caller: &Caller, loan_ids: &[LoanId]) -> Result<usize, LoanError> {
        caller.require_staff()?;
        if let Some(missing) = loan_ids.iter().find(|id| !self.ledger.contains(**id)) {
            warn!(loan = %missing, "bulk return references unknown loan");
            return Err(LoanError::LoanNotFound);
        }

        let closed = self.close_all(loan_ids);
        info!(requested = loan_ids.len(), closed, "bulk return");
        Ok(closed)
    }

    fn close_all(&self, loan_ids: &[LoanId]) -> usize {
        let now = self.clock.now();
        let mut closed = 0;
        for id in loan_ids {
            match self.ledger.close(*id, now, EventKind::ForceReturned, |_| Ok(())) {
                Ok((_, ReturnOutcome::Returned)) => closed += 1,
                Ok((_, ReturnOutcome::AlreadyReturned)) => {}
                Err(e) => warn!(loan = %id, "bulk return skipped loan: {e}"),
            }
        }
        closed
    }

    /// Runs a mutating request on behalf of `caller`.
    pub fn process(&self, caller: &Caller, request: LoanRequest) -> Result<LoanReceipt, LoanError> {
        match request {
            LoanRequest::Borrow { book } => self.borrow(caller, book).map(LoanReceipt::Borrowed),
            LoanRequest::Return { loan } => self.return_loan(caller, loan),
            LoanRequest::ForceReturn { loan } => self.force_return(caller, loan),
        }
    }

    pub fn loan(&self, id: LoanId) -> Option<Loan> {
        self.ledger.get(id)
    }

    /// Every loan of a borrower, most recent borrow first.
    pub fn loans_for(&self, borrower: BorrowerId) -> Vec<Loan> {
        self.ledger.for_borrower(borrower)
    }

    /// The borrower's most recent open loan of a book, if any.
    pub fn open_loan_for(&self, borrower: BorrowerId, book: BookId) -> Option<Loan> {
        self.ledger
            .for_borrower(borrower)
            .into_iter()
            .find(|loan| loan.book_id() == book && loan.is_open())
    }

    /// Open loans of a book. Staff only.
    pub fn current_borrowers(&self, caller: &Caller, book: BookId) -> Result<Vec<Loan>, LoanError> {
        caller.require_staff()?;
        if self.catalog.get(book).is_none() {
            return Err(LoanError::BookNotFound);
        }
        let mut loans = self.ledger.for_book(book);
        loans.retain(Loan::is_open);
        Ok(loans)
    }

    /// Every loan of a book, returned ones included, most recent borrow
    /// first. Staff only.
    pub fn loan_history(&self, caller: &Caller, book: BookId) -> Result<Vec<Loan>, LoanError> {
        caller.require_staff()?;
        if self.catalog.get(book).is_none() {
            return Err(LoanError::BookNotFound);
        }
        Ok(self.ledger.for_book(book))
    }

    /// Open loans due strictly before `today`, most recent borrow first.
    /// Staff only.
    pub fn overdue_loans(
        &self,
        caller: &Caller,
        today: NaiveDate,
    ) -> Result<Vec<OverdueLoan>, LoanError> {
        caller.require_staff()?;
        let overdue: Vec<OverdueLoan> = self
            .ledger
            .overdue(today)
            .into_iter()
            // A loan whose book vanished mid-read was cascaded away.
            .filter_map(|loan| {
                let book = self.catalog.get(loan.book_id())?;
                Some(OverdueLoan { loan, book })
            })
            .collect();
        debug!(%today, count = overdue.len(), "overdue query");
        Ok(overdue)
    }

    /// [`Library::overdue_loans`] as of the clock's current local date.
    pub fn overdue_today(&self, caller: &Caller) -> Result<Vec<OverdueLoan>, LoanError> {
        self.overdue_loans(caller, self.clock.today())
    }

    /// Takes the journal of borrow and return events recorded so far.
    ///
    /// Events accumulate until drained. Long-lived libraries should call this
    /// periodically or disable the journal in [`LibraryConfig`].
    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        self.ledger.drain_events()
    }

    fn close(
        &self,
        loan_id: LoanId,
        kind: EventKind,
        authorize: impl FnOnce(&Loan) -> Result<(), LoanError>,
    ) -> Result<LoanReceipt, LoanError> {
        let now = self.clock.now();
        let (loan, outcome) = match self.ledger.close(loan_id, now, kind, authorize) {
            Ok(closed) => closed,
            Err(e) => {
                warn!(loan = %loan_id, "return rejected: {e}");
                return Err(e);
            }
        };

        match outcome {
            ReturnOutcome::Returned => {
                info!(loan = %loan_id, book = %loan.book_id(), ?kind, "loan returned");
                Ok(LoanReceipt::Returned(loan))
            }
            ReturnOutcome::AlreadyReturned => {
                debug!(loan = %loan_id, "loan already returned");
                Ok(LoanReceipt::AlreadyReturned(loan))
            }
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(&LibraryConfig::default())
    }
}
