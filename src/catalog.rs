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

//! Book catalog.
//!
//! Books live in a [`DashMap`] keyed by ID, each behind its own
//! [`Mutex`]. Holding a book's mutex is what serializes work that must see a
//! consistent copy count, such as the check-and-create step of a borrow.
//! A second map indexes books by ISBN and is the single point where ISBN
//! uniqueness is decided.

use crate::LoanError;
use crate::base::BookId;
use crate::book::{Book, BookUpdate, Isbn, NewBook};
use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
struct Shelf {
    book: Mutex<Book>,
}

/// Concurrent catalog of books.
///
/// # Lock order
///
/// Shelf entry, then the book mutex, then (inside [`Catalog::with_book`])
/// whatever the closure touches. The ISBN index is only ever locked on its
/// own or after a book mutex, never the other way around.
#[derive(Debug)]
pub struct Catalog {
    shelves: DashMap<BookId, Shelf>,
    isbns: DashMap<Isbn, BookId>,
    next_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            shelves: DashMap::new(),
            isbns: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Adds a book, assigning it a fresh ID.
    ///
    /// # Errors
    ///
    /// - [`LoanError::InvalidIsbn`], [`LoanError::BlankField`],
    ///   [`LoanError::FieldTooLong`] - malformed input.
    /// - [`LoanError::DuplicateIsbn`] - another book already has this ISBN.
    pub fn add(&self, new: NewBook, created_at: DateTime<FixedOffset>) -> Result<Book, LoanError> {
        let id = BookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let book = Book::create(id, new, created_at)?;

        // Entry API makes check-and-reserve atomic for the ISBN.
        match self.isbns.entry(book.isbn().clone()) {
            Entry::Occupied(_) => return Err(LoanError::DuplicateIsbn),
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        self.shelves.insert(
            id,
            Shelf {
                book: Mutex::new(book.clone()),
            },
        );
        Ok(book)
    }

    /// Runs `f` while holding the book's mutex.
    ///
    /// Other calls to `with_book` for the same ID wait until `f` returns.
    pub fn with_book<R>(
        &self,
        id: BookId,
        f: impl FnOnce(&Book) -> Result<R, LoanError>,
    ) -> Result<R, LoanError> {
        let shelf = self.shelves.get(&id).ok_or(LoanError::BookNotFound)?;
        let book = shelf.book.lock();
        f(&book)
    }

    pub fn get(&self, id: BookId) -> Option<Book> {
        self.shelves.get(&id).map(|shelf| shelf.book.lock().clone())
    }

    pub fn find_by_isbn(&self, isbn: &Isbn) -> Option<Book> {
        // Copy the ID out so the index guard is released before the shelf
        // is locked.
        let id = *self.isbns.get(isbn)?;
        self.get(id)
    }

    /// Edits a book's metadata.
    ///
    /// A changed ISBN is reserved in the index before the old one is
    /// released, so two books can never share one.
    pub fn update(&self, id: BookId, mut update: BookUpdate) -> Result<Book, LoanError> {
        let shelf = self.shelves.get(&id).ok_or(LoanError::BookNotFound)?;
        let mut book = shelf.book.lock();

        let new_isbn = match update.isbn.take() {
            Some(raw) => {
                let isbn = Isbn::parse(&raw)?;
                (&isbn != book.isbn()).then_some(isbn)
            }
            None => None,
        };

        // Reject bad text before reserving anything in the index.
        let mut edited = book.clone();
        edited.apply(update, new_isbn.clone())?;

        if let Some(isbn) = new_isbn {
            match self.isbns.entry(isbn) {
                Entry::Occupied(_) => return Err(LoanError::DuplicateIsbn),
                Entry::Vacant(entry) => {
                    entry.insert(id);
                }
            }
            self.isbns.remove(book.isbn());
        }

        *book = edited;
        Ok(book.clone())
    }

    /// Removes a book from the catalog and releases its ISBN.
    pub fn remove(&self, id: BookId) -> Result<Book, LoanError> {
        let (_, shelf) = self.shelves.remove(&id).ok_or(LoanError::BookNotFound)?;
        let book = shelf.book.into_inner();
        self.isbns.remove(book.isbn());
        Ok(book)
    }

    /// Snapshot of every book, ordered by title then ID.
    pub fn books(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .shelves
            .iter()
            .map(|shelf| shelf.book.lock().clone())
            .collect();
        books.sort_by(|a, b| a.title().cmp(b.title()).then(a.id().cmp(&b.id())));
        books
    }

    pub fn search(&self, query: &str) -> Vec<Book> {
        let mut books = self.books();
        books.retain(|book| book.matches(query));
        books
    }

    pub fn len(&self) -> usize {
        self.shelves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shelves.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
