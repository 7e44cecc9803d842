//! SQLite-backed durable event store.
//!
//! # Responsibility
//! - Map events to and from rows of the `events` table.
//! - Run conflict checks and writes inside one `IMMEDIATE` transaction.
//!
//! # Invariants
//! - Each instant is stored as whole Unix seconds plus sub-second nanoseconds,
//!   so every `DateTime<Utc>` chrono can represent round-trips unchanged.
//! - Rows are validated on read; corrupt rows surface as `InvalidData`.
//! - The connection passes `verify_schema` before any query runs.

use crate::db::migrations::verify_schema;
use crate::db::{open_db, open_db_in_memory};
use crate::model::event::{Event, EventId, TimeSpan};
use crate::repo::event_repo::{EventRepository, Page, RepoError, RepoResult};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

const EVENT_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    start_secs,
    start_nanos,
    end_secs,
    end_nanos
FROM events";

/// Event starts before the window end and ends after the window start.
/// Binds: window end secs, window end nanos, window start secs, window start nanos.
const OVERLAP_FILTER_SQL: &str = "(start_secs < ? OR (start_secs = ? AND start_nanos < ?))
    AND (end_secs > ? OR (end_secs = ? AND end_nanos > ?))";

const LISTING_ORDER_SQL: &str = " ORDER BY start_secs ASC, start_nanos ASC, uuid ASC";

/// Event repository over a single SQLite connection.
pub struct SqliteEventRepository {
    conn: Mutex<Connection>,
}

impl SqliteEventRepository {
    /// Wraps a connection that already carries the current schema.
    ///
    /// # Errors
    /// - `RepoError::Db` with `OutdatedSchema` when migrations have not run.
    /// - `RepoError::Db` with `MissingTable` / `MissingColumn` for a damaged layout.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        verify_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (or creates) a database file and migrates it.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }
}

impl EventRepository for SqliteEventRepository {
    fn create(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_event(&tx, event)?;
        tx.commit()?;
        Ok(event.id)
    }

    fn update(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;
        let conn = self.conn.lock();
        update_event(&conn, event)
    }

    fn find_by_id(&self, id: EventId) -> RepoResult<Event> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{EVENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_event_row(row);
        }
        Err(RepoError::NotFound(id))
    }

    fn delete_by_id(&self, id: EventId) -> RepoResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM events WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn find_by_span(&self, span: &TimeSpan, page: Option<Page>) -> RepoResult<Vec<Event>> {
        let mut sql = format!("{EVENT_SELECT_SQL} WHERE {OVERLAP_FILTER_SQL}");
        let mut bind_values = overlap_bind_values(span);
        sql.push_str(LISTING_ORDER_SQL);
        push_page(&mut sql, &mut bind_values, page);

        let conn = self.conn.lock();
        query_events(&conn, &sql, bind_values)
    }

    fn list_all(&self, page: Option<Page>) -> RepoResult<Vec<Event>> {
        let mut sql = format!("{EVENT_SELECT_SQL}{LISTING_ORDER_SQL}");
        let mut bind_values = Vec::new();
        push_page(&mut sql, &mut bind_values, page);

        let conn = self.conn.lock();
        query_events(&conn, &sql, bind_values)
    }

    fn first_overlapping(
        &self,
        span: &TimeSpan,
        exclude: Option<EventId>,
    ) -> RepoResult<Option<EventId>> {
        let conn = self.conn.lock();
        first_overlapping_on(&conn, span, exclude)
    }

    fn create_if_free(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(conflict) = first_overlapping_on(&tx, &event.span(), None)? {
            debug!(
                "event=span_check module=repo status=occupied event_id={} conflict_id={}",
                event.id, conflict
            );
            return Err(RepoError::SpanOccupied(conflict));
        }
        insert_event(&tx, event)?;
        tx.commit()?;
        Ok(event.id)
    }

    fn update_if_free(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(conflict) = first_overlapping_on(&tx, &event.span(), Some(event.id))? {
            debug!(
                "event=span_check module=repo status=occupied event_id={} conflict_id={}",
                event.id, conflict
            );
            return Err(RepoError::SpanOccupied(conflict));
        }
        update_event(&tx, event)?;
        tx.commit()?;
        Ok(())
    }
}

fn insert_event(conn: &Connection, event: &Event) -> RepoResult<()> {
    let present = conn
        .query_row(
            "SELECT 1 FROM events WHERE uuid = ?1;",
            [event.id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if present.is_some() {
        return Err(RepoError::AlreadyExists(event.id));
    }

    let (start_secs, start_nanos) = encode_instant(event.start);
    let (end_secs, end_nanos) = encode_instant(event.end);
    conn.execute(
        "INSERT INTO events (
            uuid,
            title,
            description,
            start_secs,
            start_nanos,
            end_secs,
            end_nanos
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            event.id.to_string(),
            event.title.as_str(),
            event.description.as_str(),
            start_secs,
            start_nanos,
            end_secs,
            end_nanos,
        ],
    )?;
    Ok(())
}

fn update_event(conn: &Connection, event: &Event) -> RepoResult<()> {
    let (start_secs, start_nanos) = encode_instant(event.start);
    let (end_secs, end_nanos) = encode_instant(event.end);
    let changed = conn.execute(
        "UPDATE events
         SET
            title = ?1,
            description = ?2,
            start_secs = ?3,
            start_nanos = ?4,
            end_secs = ?5,
            end_nanos = ?6,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?7;",
        params![
            event.title.as_str(),
            event.description.as_str(),
            start_secs,
            start_nanos,
            end_secs,
            end_nanos,
            event.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(event.id));
    }
    Ok(())
}

fn first_overlapping_on(
    conn: &Connection,
    span: &TimeSpan,
    exclude: Option<EventId>,
) -> RepoResult<Option<EventId>> {
    let sql = format!(
        "SELECT uuid
         FROM events
         WHERE {OVERLAP_FILTER_SQL}
           AND (? IS NULL OR uuid <> ?)
         {LISTING_ORDER_SQL}
         LIMIT 1;"
    );
    let excluded = exclude.map_or(Value::Null, |id| Value::Text(id.to_string()));
    let mut bind_values = overlap_bind_values(span);
    bind_values.push(excluded.clone());
    bind_values.push(excluded);

    let uuid_text = conn
        .query_row(&sql, params_from_iter(bind_values), |row| {
            row.get::<_, String>(0)
        })
        .optional()?;

    uuid_text.map(|text| parse_uuid_column(&text)).transpose()
}

fn overlap_bind_values(span: &TimeSpan) -> Vec<Value> {
    let (end_secs, end_nanos) = encode_instant(span.end);
    let (start_secs, start_nanos) = encode_instant(span.start);
    vec![
        Value::Integer(end_secs),
        Value::Integer(end_secs),
        Value::Integer(end_nanos),
        Value::Integer(start_secs),
        Value::Integer(start_secs),
        Value::Integer(start_nanos),
    ]
}

fn query_events(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        events.push(parse_event_row(row)?);
    }
    Ok(events)
}

fn push_page(sql: &mut String, bind_values: &mut Vec<Value>, page: Option<Page>) {
    if let Some(page) = page {
        sql.push_str(" LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(page.limit())));
        bind_values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid_column(&uuid_text)?;
    let start = decode_instant(row.get("start_secs")?, row.get("start_nanos")?)
        .ok_or_else(|| RepoError::InvalidData(format!("event {uuid_text}: bad start instant")))?;
    let end = decode_instant(row.get("end_secs")?, row.get("end_nanos")?)
        .ok_or_else(|| RepoError::InvalidData(format!("event {uuid_text}: bad end instant")))?;

    let event = Event {
        id,
        title: row.get("title")?,
        start,
        end,
        description: row.get("description")?,
    };
    event
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("event {uuid_text}: {err}")))?;
    Ok(event)
}

fn parse_uuid_column(text: &str) -> RepoResult<EventId> {
    EventId::parse(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in events.uuid")))
}

/// Splits an instant into `(unix seconds, sub-second nanoseconds)`.
///
/// The pair orders the same way as the instant, leap seconds included.
fn encode_instant(instant: DateTime<Utc>) -> (i64, i64) {
    (
        instant.timestamp(),
        i64::from(instant.timestamp_subsec_nanos()),
    )
}

fn decode_instant(secs: i64, nanos: i64) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(nanos).ok()?;
    Utc.timestamp_opt(secs, nanos).single()
}
