//! SQLite bootstrap for the durable event store.
//!
//! # Responsibility
//! - Open connections and bring them to the current event schema.
//! - Refuse databases whose schema this build cannot read.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - A connection handed to the event repository has passed
//!   `migrations::verify_schema`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or checking the event database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// Migrations have not been run on this connection.
    OutdatedSchema { found: u32, expected: u32 },
    MissingTable(&'static str),
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "event database is at schema {found}, this build reads up to {supported}"
            ),
            Self::OutdatedSchema { found, expected } => write!(
                f,
                "event database is at schema {found}, expected {expected}; run migrations first"
            ),
            Self::MissingTable(table) => write!(f, "event database lacks table `{table}`"),
            Self::MissingColumn { table, column } => {
                write!(f, "event database table `{table}` lacks column `{column}`")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let Self::Sqlite(err) = self {
            return Some(err);
        }
        None
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
