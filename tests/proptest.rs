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

//! Property-based tests for the library.
//!
//! These tests verify invariants that should hold for any sequence of
//! borrow and return requests.

use chrono::{DateTime, TimeDelta};
use library_loans::{
    BookId, BorrowerId, Caller, Clock, Library, LibraryConfig, LoanConfig, LoanError, LoanId,
    ManualClock, NewBook, available_copies,
};
use proptest::prelude::*;
use std::sync::Arc;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Borrow { book: usize, borrower: u32 },
    Return { loan: u32, borrower: u32 },
    Advance { hours: i64 },
}

fn arb_op(books: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..books, 1u32..=5).prop_map(|(book, borrower)| Op::Borrow { book, borrower }),
        2 => (1u32..=40, 1u32..=5).prop_map(|(loan, borrower)| Op::Return { loan, borrower }),
        1 => (1i64..=96).prop_map(|hours| Op::Advance { hours }),
    ]
}

fn arb_copies() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=3, 1..=4)
}

fn setup(copies: &[u32], period_days: u32) -> (Library, Arc<ManualClock>, Vec<BookId>) {
    let clock = Arc::new(ManualClock::new(
        DateTime::parse_from_rfc3339("2025-03-01T08:00:00-03:00").unwrap(),
    ));
    let config = LibraryConfig {
        loans: LoanConfig { period_days },
        ..LibraryConfig::default()
    };
    let library = Library::with_clock(&config, clock.clone());
    let ids = copies
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let isbn = format!("{:013}", i);
            library
                .add_book(NewBook::new(format!("Livro {i}"), "Autor", isbn, n))
                .unwrap()
                .id()
        })
        .collect();
    (library, clock, ids)
}

fn apply(library: &Library, clock: &ManualClock, books: &[BookId], op: &Op) {
    match *op {
        Op::Borrow { book, borrower } => {
            let _ = library.borrow(&Caller::member(BorrowerId(borrower)), books[book]);
        }
        Op::Return { loan, borrower } => {
            let _ = library.return_loan(&Caller::member(BorrowerId(borrower)), LoanId(loan));
        }
        Op::Advance { hours } => clock.advance(TimeDelta::hours(hours)),
    }
}

fn open_count(library: &Library, book: BookId) -> u32 {
    let staff = Caller::staff(BorrowerId(0));
    library.current_borrowers(&staff, book).unwrap().len() as u32
}

// =============================================================================
// Availability Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Availability always equals copies minus open loans, floored at zero.
    #[test]
    fn availability_matches_open_loans(
        copies in arb_copies(),
        ops in prop::collection::vec(arb_op(4), 0..60),
    ) {
        let (library, clock, books) = setup(&copies, 14);
        let ops: Vec<_> = ops
            .into_iter()
            .map(|op| match op {
                Op::Borrow { book, borrower } => Op::Borrow { book: book % books.len(), borrower },
                other => other,
            })
            .collect();

        for op in &ops {
            apply(&library, &clock, &books, op);
            for &book in &books {
                let total = library.book(book).unwrap().total_copies();
                let open = open_count(&library, book);
                prop_assert!(open <= total);
                prop_assert_eq!(
                    library.available_copies(book).unwrap(),
                    available_copies(total, open)
                );
            }
        }
    }

    /// A borrow at full capacity is rejected and creates nothing.
    #[test]
    fn full_book_rejects_borrow(copies in 0u32..=5, borrower in 1u32..=10) {
        let (library, _, books) = setup(&[copies], 14);
        for b in 0..copies {
            library.borrow(&Caller::member(BorrowerId(100 + b)), books[0]).unwrap();
        }

        let before = library.loans_for(BorrowerId(borrower)).len();
        let result = library.borrow(&Caller::member(BorrowerId(borrower)), books[0]);
        prop_assert_eq!(result, Err(LoanError::NoCopiesAvailable));
        prop_assert_eq!(library.loans_for(BorrowerId(borrower)).len(), before);
        prop_assert_eq!(library.available_copies(books[0]).unwrap(), 0);
    }

    /// Due dates never precede the borrow date, whatever the time of day.
    #[test]
    fn due_date_not_before_borrow_date(
        period_days in 0u32..=60,
        offset_minutes in 0i64..(24 * 60 * 30),
    ) {
        let (library, clock, books) = setup(&[1], period_days);
        clock.advance(TimeDelta::minutes(offset_minutes));
        let loan = library.borrow(&Caller::member(BorrowerId(1)), books[0]).unwrap();
        prop_assert!(loan.due_date() >= loan.borrowed_at().date_naive());
        prop_assert_eq!(
            (loan.due_date() - loan.borrowed_at().date_naive()).num_days(),
            i64::from(period_days)
        );
    }
}

// =============================================================================
// Loan Lifecycle Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Only the first return records a timestamp.
    #[test]
    fn return_sets_timestamp_once(repeats in 1usize..5, gap_hours in 1i64..48) {
        let (library, clock, books) = setup(&[1], 14);
        let alice = Caller::member(BorrowerId(1));
        let loan = library.borrow(&alice, books[0]).unwrap();

        library.return_loan(&alice, loan.id()).unwrap();
        let first = library.loan(loan.id()).unwrap().returned_at();
        prop_assert!(first.is_some());

        for _ in 0..repeats {
            clock.advance(TimeDelta::hours(gap_hours));
            library.return_loan(&alice, loan.id()).unwrap();
            prop_assert_eq!(library.loan(loan.id()).unwrap().returned_at(), first);
        }
    }

    /// Overdue iff open and today is past the due date.
    #[test]
    fn overdue_iff_open_and_past_due(days in 0i64..40, returned in any::<bool>()) {
        let (library, clock, books) = setup(&[1], 14);
        let alice = Caller::member(BorrowerId(1));
        let loan = library.borrow(&alice, books[0]).unwrap();
        if returned {
            library.return_loan(&alice, loan.id()).unwrap();
        }

        clock.advance(TimeDelta::days(days));
        let today = library.clock().today();
        let overdue = library.overdue_today(&Caller::staff(BorrowerId(0))).unwrap();

        let expected = !returned && today > loan.due_date();
        prop_assert_eq!(overdue.len() == 1, expected);
        prop_assert_eq!(library.loan(loan.id()).unwrap().is_overdue(today), expected);
    }
}
