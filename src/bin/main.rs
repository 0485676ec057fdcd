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

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use library_loans::{
    BookId, BorrowerId, Caller, Clock, Isbn, Library, LibraryConfig, LoanId, LoanReceipt,
    LoanRequest, ManualClock, NewBook, OverdueLoan,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Library Loans - Replay borrow/return activity against a catalog
///
/// Loads books from a catalog CSV, replays an activity CSV in order and
/// writes a report to stdout.
#[derive(Parser, Debug)]
#[command(name = "library-loans")]
#[command(about = "Replays library loan activity and reports availability", long_about = None)]
struct Args {
    /// Path to CSV file with books
    ///
    /// Expected format: isbn,title,author,copies
    #[arg(value_name = "CATALOG")]
    catalog: PathBuf,

    /// Path to CSV file with borrow/return activity
    ///
    /// Expected format: action,borrower,isbn,loan,at
    #[arg(value_name = "ACTIVITY")]
    activity: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Borrower IDs that carry the staff capability
    #[arg(long, value_delimiter = ',')]
    staff: Vec<u32>,

    /// Report written to stdout
    #[arg(long, value_enum, default_value_t = Report::Availability)]
    report: Report,

    /// Date for the overdue report (defaults to the clock's date after replay)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Write the ledger journal to this CSV file
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Identity used for the staff-only reports.
const OPERATOR: BorrowerId = BorrowerId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Availability,
    Loans,
    Overdue,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Installs a stderr subscriber. `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("library_loans={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => LibraryConfig::load(path)?,
        None => LibraryConfig::default(),
    };

    let clock = Arc::new(ManualClock::new(Local::now().fixed_offset()));
    let library = Library::with_clock(&config, clock.clone());
    let staff: HashSet<u32> = args.staff.iter().copied().collect();

    let catalog = File::open(&args.catalog)
        .with_context(|| format!("failed to open catalog '{}'", args.catalog.display()))?;
    let added = load_catalog(&library, BufReader::new(catalog)).context("failed to read catalog")?;
    info!(books = added, "catalog loaded");

    if let Some(path) = &args.activity {
        let activity = File::open(path)
            .with_context(|| format!("failed to open activity '{}'", path.display()))?;
        let applied = replay_activity(&library, &clock, &staff, BufReader::new(activity))
            .context("failed to read activity")?;
        info!(applied, "activity replayed");
    }

    if let Some(path) = &args.journal {
        let file = File::create(path)
            .with_context(|| format!("failed to create journal '{}'", path.display()))?;
        write_journal(&library, file).context("failed to write journal")?;
    }

    let stdout = std::io::stdout();
    let written = match args.report {
        Report::Availability => write_availability(&library, stdout),
        Report::Loans => write_loans(&library, stdout),
        Report::Overdue => {
            let today = args.today.unwrap_or_else(|| clock.today());
            let overdue = library.overdue_loans(&Caller::staff(OPERATOR), today)?;
            write_overdue(&overdue, today, stdout)
        }
    };
    written.context("failed to write report")
}

/// Raw catalog row. Fields: `isbn, title, author, copies`
#[derive(Debug, Deserialize)]
struct BookRecord {
    isbn: String,
    title: String,
    author: String,
    copies: u32,
}

/// Adds every valid catalog row; malformed and rejected rows are skipped.
///
/// Returns how many books were added.
fn load_catalog<R: Read>(library: &Library, reader: R) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut added = 0;
    for result in rdr.deserialize::<BookRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed catalog row: {e}");
                continue;
            }
        };
        let isbn = record.isbn.clone();
        match library.add_book(NewBook::new(record.title, record.author, record.isbn, record.copies)) {
            Ok(_) => added += 1,
            Err(e) => warn!(%isbn, "skipping book: {e}"),
        }
    }
    Ok(added)
}

/// Raw activity row. Fields: `action, borrower, isbn, loan, at`
#[derive(Debug, Deserialize)]
struct ActivityRecord {
    action: String,
    borrower: u32,
    #[serde(default)]
    isbn: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loan: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at: Option<DateTime<FixedOffset>>,
}

impl ActivityRecord {
    /// Resolves the row into a request against `library`.
    ///
    /// Returns `None` for unknown actions or rows that name neither a known
    /// book nor a loan.
    fn into_request(self, library: &Library) -> Option<LoanRequest> {
        let borrower = BorrowerId(self.borrower);
        match self.action.to_lowercase().as_str() {
            "borrow" => {
                let book = find_book(library, &self.isbn)?;
                Some(LoanRequest::Borrow { book })
            }
            "return" => {
                let loan = match self.loan {
                    Some(id) => LoanId(id),
                    None => {
                        let book = find_book(library, &self.isbn)?;
                        library.open_loan_for(borrower, book)?.id()
                    }
                };
                Some(LoanRequest::Return { loan })
            }
            "force_return" => Some(LoanRequest::ForceReturn {
                loan: LoanId(self.loan?),
            }),
            _ => None,
        }
    }
}

fn find_book(library: &Library, raw: &str) -> Option<BookId> {
    let isbn = Isbn::parse(raw).ok()?;
    library.find_by_isbn(&isbn).map(|book| book.id())
}

/// Replays activity rows in order, moving the clock to each row's `at`.
///
/// Malformed rows and rejected requests are logged and skipped. Returns how
/// many requests succeeded.
fn replay_activity<R: Read>(
    library: &Library,
    clock: &ManualClock,
    staff: &HashSet<u32>,
    reader: R,
) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow missing trailing fields
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0;
    for result in rdr.deserialize::<ActivityRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed activity row: {e}");
                continue;
            }
        };

        if let Some(at) = record.at {
            clock.set(at);
        }
        let caller = if staff.contains(&record.borrower) {
            Caller::staff(BorrowerId(record.borrower))
        } else {
            Caller::member(BorrowerId(record.borrower))
        };

        let Some(request) = record.into_request(library) else {
            warn!(borrower = %caller.borrower(), "skipping unresolvable activity row");
            continue;
        };

        match library.process(&caller, request) {
            Ok(LoanReceipt::AlreadyReturned(loan)) => {
                debug!(loan = %loan.id(), "already returned");
            }
            Ok(receipt) => {
                debug!("{}", receipt.loan());
                applied += 1;
            }
            Err(e) => warn!(?request, "skipping request: {e}"),
        }
    }
    Ok(applied)
}

/// Writes availability rows for every book, ordered by title.
///
/// # CSV Format
///
/// Columns: `book, isbn, title, total, on_loan, available`
fn write_availability<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for row in library.books() {
        wtr.serialize(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the loan history of every book, most recent borrow first.
///
/// # CSV Format
///
/// Columns: `loan, book, borrower, borrowed_at, due_date, returned_at, status`
fn write_loans<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let operator = Caller::staff(OPERATOR);
    let mut wtr = Writer::from_writer(writer);
    for row in library.books() {
        // A book removed since `books()` was read simply has no history.
        for loan in library.loan_history(&operator, row.book).unwrap_or_default() {
            wtr.serialize(&loan)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Row of the overdue report.
#[derive(Debug, Serialize)]
struct OverdueRow {
    loan: LoanId,
    borrower: BorrowerId,
    isbn: String,
    title: String,
    due_date: NaiveDate,
    days_overdue: i64,
}

/// Writes open loans past due as of `today`.
///
/// # CSV Format
///
/// Columns: `loan, borrower, isbn, title, due_date, days_overdue`
fn write_overdue<W: Write>(
    overdue: &[OverdueLoan],
    today: NaiveDate,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for entry in overdue {
        wtr.serialize(OverdueRow {
            loan: entry.loan.id(),
            borrower: entry.loan.borrower(),
            isbn: entry.book.isbn().to_string(),
            title: entry.book.title().to_owned(),
            due_date: entry.loan.due_date(),
            days_overdue: entry.loan.days_overdue(today),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the ledger journal.
///
/// # CSV Format
///
/// Columns: `kind, loan, book, borrower, at`
fn write_journal<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for event in library.drain_events() {
        wtr.serialize(&event)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CATALOG: &str = "isbn,title,author,copies\n\
                           9788535910663,Dom Casmurro,Machado de Assis,2\n\
                           9788501061027,Vidas Secas,Graciliano Ramos,1\n";

    fn start() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2025-03-01T10:00:00-03:00").unwrap(),
        ))
    }

    fn setup(activity: &str, staff: &[u32]) -> (Library, Arc<ManualClock>, usize) {
        let clock = start();
        let library = Library::with_clock(&LibraryConfig::default(), clock.clone());
        load_catalog(&library, Cursor::new(CATALOG)).unwrap();
        let staff: HashSet<u32> = staff.iter().copied().collect();
        let applied = replay_activity(&library, &clock, &staff, Cursor::new(activity)).unwrap();
        (library, clock, applied)
    }

    fn dom_casmurro(library: &Library) -> BookId {
        find_book(library, "9788535910663").unwrap()
    }

    #[test]
    fn load_simple_catalog() {
        let (library, _, _) = setup("action,borrower,isbn,loan,at\n", &[]);
        assert_eq!(library.books().len(), 2);
        assert_eq!(library.available_copies(dom_casmurro(&library)).unwrap(), 2);
    }

    #[test]
    fn catalog_skips_bad_rows() {
        let library = Library::default();
        let csv = "isbn,title,author,copies\n\
                   9788535910663,Dom Casmurro,Machado de Assis,2\n\
                   123,Short ISBN,Autor,1\n\
                   9788535910663,Duplicate,Autor,1\n\
                   9788501061027,Vidas Secas,Graciliano Ramos,many\n";
        let added = load_catalog(&library, Cursor::new(csv)).unwrap();
        assert_eq!(added, 1);
    }

    #[test]
    fn replay_borrow_and_return() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788535910663,,2025-03-01T10:00:00-03:00\n\
                        borrow,2,9788535910663,,2025-03-02T10:00:00-03:00\n\
                        borrow,3,9788535910663,,2025-03-02T11:00:00-03:00\n\
                        return,1,9788535910663,,2025-03-05T10:00:00-03:00\n";
        let (library, _, applied) = setup(activity, &[]);

        // The third borrow is rejected for lack of copies.
        assert_eq!(applied, 3);
        assert_eq!(library.available_copies(dom_casmurro(&library)).unwrap(), 1);
        assert!(library.loans_for(BorrowerId(3)).is_empty());
        assert!(!library.loans_for(BorrowerId(1))[0].is_open());
    }

    #[test]
    fn replay_moves_the_clock() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788501061027,,2025-04-10T09:00:00-03:00\n";
        let (library, clock, _) = setup(activity, &[]);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        let loan = &library.loans_for(BorrowerId(1))[0];
        assert_eq!(loan.due_date(), NaiveDate::from_ymd_opt(2025, 4, 24).unwrap());
    }

    #[test]
    fn force_return_requires_staff() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788501061027,,\n\
                        force_return,2,,1,\n\
                        force_return,9,,1,\n";
        let (library, _, applied) = setup(activity, &[9]);
        assert_eq!(applied, 2);
        assert!(!library.loan(LoanId(1)).unwrap().is_open());
    }

    #[test]
    fn return_of_someone_elses_loan_is_skipped() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788501061027,,\n\
                        return,2,,1,\n";
        let (library, _, applied) = setup(activity, &[]);
        assert_eq!(applied, 1);
        assert!(library.loan(LoanId(1)).unwrap().is_open());
    }

    #[test]
    fn skip_malformed_activity_rows() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,abc,9788501061027,,\n\
                        renew,1,9788501061027,,\n\
                        borrow,1,0000000000000,,\n\
                        borrow,1,9788501061027\n";
        let (_, _, applied) = setup(activity, &[]);
        assert_eq!(applied, 1);
    }

    #[test]
    fn write_availability_to_csv() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788535910663,,\n";
        let (library, _, _) = setup(activity, &[]);

        let mut output = Vec::new();
        write_availability(&library, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "book,isbn,title,total,on_loan,available\n\
             1,9788535910663,Dom Casmurro,2,1,1\n\
             2,9788501061027,Vidas Secas,1,0,1\n"
        );
    }

    #[test]
    fn write_loans_to_csv() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788501061027,,2025-03-01T10:00:00-03:00\n\
                        return,1,9788501061027,,2025-03-03T10:00:00-03:00\n";
        let (library, _, _) = setup(activity, &[]);

        let mut output = Vec::new();
        write_loans(&library, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "loan,book,borrower,borrowed_at,due_date,returned_at,status\n\
             1,2,1,2025-03-01T10:00:00-03:00,2025-03-15,2025-03-03T10:00:00-03:00,closed\n"
        );
    }

    #[test]
    fn write_overdue_to_csv() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,4,9788501061027,,2025-03-01T10:00:00-03:00\n";
        let (library, _, _) = setup(activity, &[]);
        let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let overdue = library
            .overdue_loans(&Caller::staff(OPERATOR), today)
            .unwrap();

        let mut output = Vec::new();
        write_overdue(&overdue, today, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "loan,borrower,isbn,title,due_date,days_overdue\n\
             1,4,9788501061027,Vidas Secas,2025-03-15,5\n"
        );
    }

    #[test]
    fn write_journal_drains_events() {
        let activity = "action,borrower,isbn,loan,at\n\
                        borrow,1,9788501061027,,2025-03-01T10:00:00-03:00\n\
                        return,1,,1,2025-03-02T10:00:00-03:00\n\
                        return,1,,1,2025-03-03T10:00:00-03:00\n";
        let (library, _, _) = setup(activity, &[]);

        let mut output = Vec::new();
        write_journal(&library, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "kind,loan,book,borrower,at\n\
             borrowed,1,2,1,2025-03-01T10:00:00-03:00\n\
             returned,1,2,1,2025-03-02T10:00:00-03:00\n"
        );
        assert!(library.drain_events().is_empty());
    }
}
