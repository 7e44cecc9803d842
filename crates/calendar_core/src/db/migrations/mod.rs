//! Event schema steps and the checks run before the store uses a connection.
//!
//! # Invariants
//! - Steps are listed in strictly increasing `version` order.
//! - All pending steps commit together or not at all.
//! - `verify_schema` accepts only the latest version with every column the
//!   event repository reads or writes.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::cmp::Ordering;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "create_events",
    sql: include_str!("0001_init.sql"),
}];

const EVENTS_TABLE: &str = "events";

const EVENT_COLUMNS: &[&str] = &[
    "uuid",
    "title",
    "description",
    "start_secs",
    "start_nanos",
    "end_secs",
    "end_nanos",
    "created_at",
    "updated_at",
];

/// Schema version written by the last step this build knows.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded in the database.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Runs every step newer than the recorded version, then verifies the result.
///
/// # Errors
/// - `UnsupportedSchemaVersion` for a database written by a newer build.
/// - `MissingTable` / `MissingColumn` when the stored layout is damaged.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = current_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > found).collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for step in &pending {
            tx.execute_batch(step.sql)?;
            tx.pragma_update(None, "user_version", step.version)?;
        }
        tx.commit()?;
        for step in &pending {
            info!(
                "event=db_migrate module=db status=ok step={} version={}",
                step.name, step.version
            );
        }
    }

    verify_schema(conn)
}

/// Checks that `conn` is at the latest version and carries the event layout.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    let found = current_version(conn)?;
    let latest = latest_version();
    match found.cmp(&latest) {
        Ordering::Greater => {
            return Err(DbError::UnsupportedSchemaVersion {
                found,
                supported: latest,
            })
        }
        Ordering::Less => {
            return Err(DbError::OutdatedSchema {
                found,
                expected: latest,
            })
        }
        Ordering::Equal => {}
    }

    let columns = table_columns(conn, EVENTS_TABLE)?;
    if columns.is_empty() {
        return Err(DbError::MissingTable(EVENTS_TABLE));
    }
    for column in EVENT_COLUMNS {
        if !columns.iter().any(|have| have == column) {
            return Err(DbError::MissingColumn {
                table: EVENTS_TABLE,
                column,
            });
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
