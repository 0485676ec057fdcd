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

//! Catalog records.
//!
//! A [`Book`] is a title with a number of physical copies. Copies are not
//! tracked individually; a loan occupies one copy of its book.

use crate::LoanError;
use crate::base::BookId;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest title or author accepted by the catalog.
pub const MAX_TEXT_LEN: usize = 255;

/// A 13-digit ISBN.
///
/// # Example
///
/// ```
/// use library_loans::Isbn;
///
/// let isbn = Isbn::parse(" 9780131103627 ").unwrap();
/// assert_eq!(isbn.as_str(), "9780131103627");
/// assert!(Isbn::parse("978-0131103627").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    pub const LEN: usize = 13;

    pub fn parse(raw: &str) -> Result<Self, LoanError> {
        let raw = raw.trim();
        if raw.len() != Self::LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LoanError::InvalidIsbn);
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input for adding a book to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: u32,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        total_copies: u32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            total_copies,
        }
    }
}

/// Partial metadata edit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub total_copies: Option<u32>,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    isbn: Isbn,
    total_copies: u32,
    created_at: DateTime<FixedOffset>,
}

impl Book {
    pub(crate) fn create(
        id: BookId,
        new: NewBook,
        created_at: DateTime<FixedOffset>,
    ) -> Result<Self, LoanError> {
        Ok(Self {
            id,
            title: validate_text("title", new.title)?,
            author: validate_text("author", new.author)?,
            isbn: Isbn::parse(&new.isbn)?,
            total_copies: new.total_copies,
            created_at,
        })
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &Isbn {
        &self.isbn
    }

    pub fn total_copies(&self) -> u32 {
        self.total_copies
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    /// Case-insensitive substring match over title, author and ISBN.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.author.to_lowercase().contains(&query)
            || self.isbn.as_str().contains(&query)
    }

    /// Applies an edit without touching the ISBN index; the caller owns
    /// uniqueness of `isbn`.
    pub(crate) fn apply(&mut self, update: BookUpdate, isbn: Option<Isbn>) -> Result<(), LoanError> {
        // Validate everything before mutating anything.
        let title = update.title.map(|t| validate_text("title", t)).transpose()?;
        let author = update.author.map(|a| validate_text("author", a)).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(author) = author {
            self.author = author;
        }
        if let Some(isbn) = isbn {
            self.isbn = isbn;
        }
        if let Some(total_copies) = update.total_copies {
            self.total_copies = total_copies;
        }
        Ok(())
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.title, self.author)
    }
}

fn validate_text(field: &'static str, value: String) -> Result<String, LoanError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoanError::BlankField(field));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(LoanError::FieldTooLong(field));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-01T10:00:00+00:00").unwrap()
    }

    fn sample() -> Book {
        Book::create(
            BookId(1),
            NewBook::new("Dom Casmurro", "Machado de Assis", "9788535910663", 2),
            created_at(),
        )
        .unwrap()
    }

    #[test]
    fn isbn_requires_thirteen_digits() {
        assert!(Isbn::parse("0000000000000").is_ok());
        assert_eq!(Isbn::parse("000000000000"), Err(LoanError::InvalidIsbn));
        assert_eq!(Isbn::parse("00000000000000"), Err(LoanError::InvalidIsbn));
        assert_eq!(Isbn::parse("000000000000X"), Err(LoanError::InvalidIsbn));
        assert_eq!(Isbn::parse(""), Err(LoanError::InvalidIsbn));
    }

    #[test]
    fn create_trims_text_fields() {
        let book = Book::create(
            BookId(3),
            NewBook::new("  Teste ", " Autor", "0000000000000", 1),
            created_at(),
        )
        .unwrap();
        assert_eq!(book.title(), "Teste");
        assert_eq!(book.author(), "Autor");
        assert_eq!(book.to_string(), "Teste by Autor");
    }

    #[test]
    fn create_rejects_blank_and_long_fields() {
        let blank = NewBook::new("   ", "Autor", "0000000000000", 1);
        assert_eq!(
            Book::create(BookId(1), blank, created_at()),
            Err(LoanError::BlankField("title"))
        );

        let long = NewBook::new("Teste", "a".repeat(MAX_TEXT_LEN + 1), "0000000000000", 1);
        assert_eq!(
            Book::create(BookId(1), long, created_at()),
            Err(LoanError::FieldTooLong("author"))
        );
    }

    #[test]
    fn matches_is_case_insensitive() {
        let book = sample();
        assert!(book.matches("casmurro"));
        assert!(book.matches("MACHADO"));
        assert!(book.matches("853591"));
        assert!(!book.matches("quixote"));
    }

    #[test]
    fn failed_apply_leaves_book_unchanged() {
        let mut book = sample();
        let update = BookUpdate {
            title: Some("Memórias Póstumas".into()),
            author: Some(" ".into()),
            ..BookUpdate::default()
        };
        assert_eq!(book.apply(update, None), Err(LoanError::BlankField("author")));
        assert_eq!(book, sample());
    }

    #[test]
    fn apply_edits_metadata() {
        let mut book = sample();
        let update = BookUpdate {
            title: Some("Quincas Borba".into()),
            total_copies: Some(5),
            ..BookUpdate::default()
        };
        book.apply(update, Some(Isbn::parse("9788535911111").unwrap()))
            .unwrap();
        assert_eq!(book.title(), "Quincas Borba");
        assert_eq!(book.author(), "Machado de Assis");
        assert_eq!(book.isbn().as_str(), "9788535911111");
        assert_eq!(book.total_copies(), 5);
    }
}
