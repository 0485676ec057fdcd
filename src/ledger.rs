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

//! Loan ledger with an append-only event journal.
//!
//! Loans are stored once, keyed by ID, and indexed by book and by borrower.
//! A per-book counter tracks how many loans are still open, so capacity
//! checks do not depend on how long a book's history is.
//!
//! When journaling is enabled every state change is also pushed to a
//! lock-free queue so callers can export the borrow/return history in order.
//! The queue is unbounded: a long-lived ledger with journaling on must be
//! drained with [`LoanLedger::drain_events`].

use crate::LoanError;
use crate::base::{BookId, BorrowerId, LoanId};
use crate::loan::{Loan, ReturnOutcome};
use chrono::{DateTime, FixedOffset, NaiveDate};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// What happened to a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Borrowed,
    Returned,
    ForceReturned,
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub loan: LoanId,
    pub book: BookId,
    pub borrower: BorrowerId,
    pub at: DateTime<FixedOffset>,
}

impl LedgerEvent {
    fn of(kind: EventKind, loan: &Loan, at: DateTime<FixedOffset>) -> Self {
        Self {
            kind,
            loan: loan.id(),
            book: loan.book_id(),
            borrower: loan.borrower(),
            at,
        }
    }
}

/// Concurrent store of loan records.
///
/// The ledger never calls back into the catalog; callers that need a
/// consistent open-loan count for a book must hold that book's lock.
///
/// # Lock order
///
/// `loans` entry, then `open_by_book`. Index guards are never held while
/// another map is touched.
#[derive(Debug)]
pub struct LoanLedger {
    loans: DashMap<LoanId, Loan>,
    by_book: DashMap<BookId, Vec<LoanId>>,
    by_borrower: DashMap<BorrowerId, Vec<LoanId>>,
    open_by_book: DashMap<BookId, u32>,
    next_id: AtomicU32,
    journal: Option<SegQueue<LedgerEvent>>,
}

impl LoanLedger {
    /// Creates an empty ledger with journaling enabled.
    pub fn new() -> Self {
        Self::with_journal(true)
    }

    /// Creates an empty ledger. With `journal` off, no events are recorded
    /// and [`LoanLedger::drain_events`] always returns nothing.
    pub fn with_journal(journal: bool) -> Self {
        Self {
            loans: DashMap::new(),
            by_book: DashMap::new(),
            by_borrower: DashMap::new(),
            open_by_book: DashMap::new(),
            next_id: AtomicU32::new(1),
            journal: journal.then(SegQueue::new),
        }
    }

    /// Creates and stores an open loan.
    ///
    /// # Errors
    ///
    /// [`LoanError::DueBeforeBorrowed`] if the due date precedes the borrow
    /// date. Nothing is stored in that case.
    pub fn open(
        &self,
        book: BookId,
        borrower: BorrowerId,
        borrowed_at: DateTime<FixedOffset>,
        due_date: NaiveDate,
    ) -> Result<Loan, LoanError> {
        let id = LoanId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let loan = Loan::new(id, book, borrower, borrowed_at, due_date)?;

        self.loans.insert(id, loan.clone());
        self.by_book.entry(book).or_default().push(id);
        self.by_borrower.entry(borrower).or_default().push(id);
        *self.open_by_book.entry(book).or_insert(0) += 1;
        self.record(LedgerEvent::of(EventKind::Borrowed, &loan, borrowed_at));
        Ok(loan)
    }

    /// Closes a loan, recording `kind` in the journal if it was open.
    ///
    /// `authorize` sees the loan before anything changes and may veto the
    /// close.
    pub fn close(
        &self,
        id: LoanId,
        at: DateTime<FixedOffset>,
        kind: EventKind,
        authorize: impl FnOnce(&Loan) -> Result<(), LoanError>,
    ) -> Result<(Loan, ReturnOutcome), LoanError> {
        let mut loan = self.loans.get_mut(&id).ok_or(LoanError::LoanNotFound)?;
        authorize(&loan)?;

        let outcome = loan.close(at);
        if outcome == ReturnOutcome::Returned {
            // A purged book has no counter left to decrement.
            if let Some(mut open) = self.open_by_book.get_mut(&loan.book_id()) {
                *open = open.saturating_sub(1);
            }
            self.record(LedgerEvent::of(kind, &loan, at));
        }
        Ok((loan.clone(), outcome))
    }

    pub fn get(&self, id: LoanId) -> Option<Loan> {
        self.loans.get(&id).map(|loan| loan.clone())
    }

    pub fn contains(&self, id: LoanId) -> bool {
        self.loans.contains_key(&id)
    }

    /// Open loans of a book.
    pub fn open_count(&self, book: BookId) -> u32 {
        self.open_by_book.get(&book).map_or(0, |open| *open)
    }

    /// Loans of a book, most recent borrow first.
    pub fn for_book(&self, book: BookId) -> Vec<Loan> {
        let mut loans = self.indexed(&self.by_book, book);
        loans.sort_by(Loan::recent_first);
        loans
    }

    /// Loans of a borrower, most recent borrow first.
    pub fn for_borrower(&self, borrower: BorrowerId) -> Vec<Loan> {
        let mut loans = self.indexed(&self.by_borrower, borrower);
        loans.sort_by(Loan::recent_first);
        loans
    }

    /// Open loans due strictly before `today`, most recent borrow first.
    pub fn overdue(&self, today: NaiveDate) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|loan| loan.is_overdue(today))
            .map(|loan| loan.clone())
            .collect();
        loans.sort_by(Loan::recent_first);
        loans
    }

    /// Deletes every loan of a book. Returns how many were removed.
    pub fn purge_book(&self, book: BookId) -> usize {
        self.open_by_book.remove(&book);
        let Some((_, ids)) = self.by_book.remove(&book) else {
            return 0;
        };

        let mut removed = 0;
        for id in &ids {
            if let Some((_, loan)) = self.loans.remove(id) {
                if let Some(mut owned) = self.by_borrower.get_mut(&loan.borrower()) {
                    owned.retain(|owned_id| owned_id != id);
                }
                removed += 1;
            }
        }
        removed
    }

    /// Takes every journal entry recorded so far, oldest first.
    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        match &self.journal {
            Some(journal) => std::iter::from_fn(|| journal.pop()).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_journaling(&self) -> bool {
        self.journal.is_some()
    }

    fn record(&self, event: LedgerEvent) {
        if let Some(journal) = &self.journal {
            journal.push(event);
        }
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    fn indexed<K>(&self, index: &DashMap<K, Vec<LoanId>>, key: K) -> Vec<Loan>
    where
        K: Eq + std::hash::Hash,
    {
        // Copy the IDs so the index guard is dropped before touching `loans`.
        let ids = index.get(&key).map(|ids| ids.clone()).unwrap_or_default();
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }
}

impl Default for LoanLedger {
    fn default() -> Self {
        Self::new()
    }
}
