//! Event repository contract, pagination and shared error type.
//!
//! # Responsibility
//! - Define the storage-agnostic API every event store implements.
//! - Own the ordering and page-slicing rules shared by implementations.
//!
//! # Invariants
//! - Listings are ordered by `(start ASC, id ASC)`.
//! - Out-of-range pages yield an empty vec, never an error.
//! - `create_if_free` / `update_if_free` check and write in one critical
//!   section, so two racing writers cannot both claim the same span.

use crate::db::DbError;
use crate::model::event::{Event, EventId, EventValidationError, TimeSpan};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors returned by event repositories.
#[derive(Debug)]
pub enum RepoError {
    /// An event with this id is already stored.
    AlreadyExists(EventId),
    /// No event with this id is stored.
    NotFound(EventId),
    /// The span is held by the given event.
    SpanOccupied(EventId),
    Validation(EventValidationError),
    /// A persisted row could not be turned back into an event.
    InvalidData(String),
    /// SQLite failure or a schema this build cannot use.
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(id) => write!(f, "event already exists: {id}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::SpanOccupied(id) => write!(f, "time span is occupied by event {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Zero-based page selector.
///
/// Page `number` covers indices `[number * size, number * size + size)` of
/// the ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }

    pub fn limit(&self) -> u32 {
        self.size
    }
}

/// Storage contract for calendar events.
///
/// Implementations must be safe to share between threads. Write paths
/// validate the event before touching storage.
pub trait EventRepository: Send + Sync {
    /// Inserts a new event.
    ///
    /// # Errors
    /// - `AlreadyExists` when the id is already stored.
    fn create(&self, event: &Event) -> RepoResult<EventId>;

    /// Replaces a stored event with the same id.
    ///
    /// # Errors
    /// - `NotFound` when the id is absent.
    fn update(&self, event: &Event) -> RepoResult<()>;

    fn find_by_id(&self, id: EventId) -> RepoResult<Event>;

    /// Removes an event permanently.
    ///
    /// # Errors
    /// - `NotFound` when the id is absent.
    fn delete_by_id(&self, id: EventId) -> RepoResult<()>;

    /// Events overlapping `span`, ordered and optionally paginated.
    fn find_by_span(&self, span: &TimeSpan, page: Option<Page>) -> RepoResult<Vec<Event>>;

    /// Every stored event, ordered and optionally paginated.
    fn list_all(&self, page: Option<Page>) -> RepoResult<Vec<Event>>;

    /// First event (in listing order) overlapping `span`, skipping `exclude`.
    fn first_overlapping(
        &self,
        span: &TimeSpan,
        exclude: Option<EventId>,
    ) -> RepoResult<Option<EventId>>;

    /// Whether any event other than `exclude` overlaps `span`.
    fn exists_overlapping(&self, span: &TimeSpan, exclude: Option<EventId>) -> RepoResult<bool> {
        Ok(self.first_overlapping(span, exclude)?.is_some())
    }

    /// Atomically checks that the event's span is free and inserts it.
    ///
    /// # Errors
    /// - `SpanOccupied` with the id of an overlapping event.
    /// - `AlreadyExists` when the id is already stored.
    fn create_if_free(&self, event: &Event) -> RepoResult<EventId>;

    /// Atomically checks that no other event overlaps the new span and
    /// replaces the stored record.
    ///
    /// # Errors
    /// - `SpanOccupied` with the id of an overlapping event.
    /// - `NotFound` when the id is absent.
    fn update_if_free(&self, event: &Event) -> RepoResult<()>;
}

macro_rules! forward_event_repository {
    ($wrapper:ident) => {
        impl<R: EventRepository + ?Sized> EventRepository for $wrapper<R> {
            fn create(&self, event: &Event) -> RepoResult<EventId> {
                (**self).create(event)
            }

            fn update(&self, event: &Event) -> RepoResult<()> {
                (**self).update(event)
            }

            fn find_by_id(&self, id: EventId) -> RepoResult<Event> {
                (**self).find_by_id(id)
            }

            fn delete_by_id(&self, id: EventId) -> RepoResult<()> {
                (**self).delete_by_id(id)
            }

            fn find_by_span(&self, span: &TimeSpan, page: Option<Page>) -> RepoResult<Vec<Event>> {
                (**self).find_by_span(span, page)
            }

            fn list_all(&self, page: Option<Page>) -> RepoResult<Vec<Event>> {
                (**self).list_all(page)
            }

            fn first_overlapping(
                &self,
                span: &TimeSpan,
                exclude: Option<EventId>,
            ) -> RepoResult<Option<EventId>> {
                (**self).first_overlapping(span, exclude)
            }

            fn exists_overlapping(
                &self,
                span: &TimeSpan,
                exclude: Option<EventId>,
            ) -> RepoResult<bool> {
                (**self).exists_overlapping(span, exclude)
            }

            fn create_if_free(&self, event: &Event) -> RepoResult<EventId> {
                (**self).create_if_free(event)
            }

            fn update_if_free(&self, event: &Event) -> RepoResult<()> {
                (**self).update_if_free(event)
            }
        }
    };
}

forward_event_repository!(Arc);
forward_event_repository!(Box);

/// Sorts events into listing order.
pub(crate) fn sort_for_listing(events: &mut [Event]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}

/// Applies an optional page to an already ordered result.
pub(crate) fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    let Some(page) = page else {
        return items;
    };
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}
