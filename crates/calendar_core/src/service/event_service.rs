//! Event scheduling use cases.
//!
//! # Responsibility
//! - Validate requests and turn them into stored events.
//! - Enforce the no-overlap rule on create and update.
//! - Derive calendar windows for day, week and month listings.
//!
//! # Invariants
//! - Overlap checks and writes go through `create_if_free` /
//!   `update_if_free`, so concurrent callers cannot double-book a span.
//! - Any overlap is a conflict: partial, containment or coincidence.
//! - Log lines carry ids and error codes only, never titles or descriptions.

use crate::calendar::CalendarPeriod;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::model::event::{
    validate_span, validate_title, Event, EventId, EventIdParseError, EventValidationError,
    TimeSpan,
};
use crate::repo::event_repo::{EventRepository, Page, RepoError};
use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ServiceResult<T> = Result<T, EventServiceError>;

/// Input for scheduling a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// Input for replacing an existing event as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    /// Identifier in string form, parsed by the service.
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// Outward projection of a stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: String,
}

impl From<Event> for EventView {
    fn from(value: Event) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            start: value.start,
            end: value.end,
            description: value.description,
        }
    }
}

/// Use-case level failures with stable machine-readable codes.
#[derive(Debug)]
pub enum EventServiceError {
    /// Title length or span rule violated.
    ValidationFailed(EventValidationError),
    /// Identifier string is not a UUID.
    InvalidIdentifier(String),
    NotFound(EventId),
    /// The requested span overlaps the given stored event.
    DateBusy(EventId),
    AlreadyExists(EventId),
    /// Backend failure unrelated to the request itself.
    Storage(RepoError),
}

impl EventServiceError {
    /// Stable error code for callers and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::NotFound(_) => "not_found",
            Self::DateBusy(_) => "date_busy",
            Self::AlreadyExists(_) => "already_exists",
            Self::Storage(_) => "storage_failure",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed(_) | Self::InvalidIdentifier(_) => 400,
            Self::NotFound(_) => 404,
            Self::DateBusy(_) | Self::AlreadyExists(_) => 409,
            Self::Storage(_) => 500,
        }
    }
}

impl Display for EventServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValidationFailed(err) => write!(f, "validation failed: {err}"),
            Self::InvalidIdentifier(input) => write!(f, "invalid event identifier `{input}`"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::DateBusy(id) => write!(f, "date busy: overlaps event {id}"),
            Self::AlreadyExists(id) => write!(f, "event already exists: {id}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for EventServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ValidationFailed(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EventServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::AlreadyExists(id) => Self::AlreadyExists(id),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::SpanOccupied(id) => Self::DateBusy(id),
            RepoError::Validation(err) => Self::ValidationFailed(err),
            other => Self::Storage(other),
        }
    }
}

impl From<EventValidationError> for EventServiceError {
    fn from(value: EventValidationError) -> Self {
        Self::ValidationFailed(value)
    }
}

impl From<EventIdParseError> for EventServiceError {
    fn from(value: EventIdParseError) -> Self {
        Self::InvalidIdentifier(value.input)
    }
}

/// Calendar service facade over an event repository.
pub struct EventService<R: EventRepository> {
    repo: R,
    page_size: u32,
}

impl<R: EventRepository> EventService<R> {
    /// Creates a service listing `DEFAULT_PAGE_SIZE` events per page.
    pub fn new(repo: R) -> Self {
        Self::with_page_size(repo, DEFAULT_PAGE_SIZE)
    }

    /// Creates a service with a custom page size; `0` means the default.
    pub fn with_page_size(repo: R, page_size: u32) -> Self {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self { repo, page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Borrows the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Schedules a new event and returns its generated id.
    ///
    /// # Errors
    /// - `ValidationFailed` for a bad title length or `end <= start`.
    /// - `DateBusy` when any stored event overlaps the span.
    pub fn create(&self, request: &CreateEventRequest) -> ServiceResult<EventId> {
        let started_at = Instant::now();
        let result = self.create_inner(request);
        let subject = result.as_ref().map(ToString::to_string).ok();
        log_outcome("event_create", started_at, subject.as_deref(), &result);
        result
    }

    fn create_inner(&self, request: &CreateEventRequest) -> ServiceResult<EventId> {
        let event = Event::new(
            request.title.as_str(),
            request.start,
            request.end,
            request.description.as_str(),
        )?;
        Ok(self.repo.create_if_free(&event)?)
    }

    /// Replaces an existing event, keeping its id.
    ///
    /// Overlap with the event's own previous span is not a conflict.
    ///
    /// # Errors
    /// - `ValidationFailed` for a bad title length or `end <= start`.
    /// - `InvalidIdentifier` when `request.id` is not a UUID.
    /// - `DateBusy` when another event overlaps the new span.
    /// - `NotFound` when no event has this id.
    pub fn update(&self, request: &UpdateEventRequest) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self.update_inner(request);
        log_outcome("event_update", started_at, Some(request.id.as_str()), &result);
        result
    }

    fn update_inner(&self, request: &UpdateEventRequest) -> ServiceResult<()> {
        // Field errors win over a malformed id.
        validate_title(&request.title)?;
        validate_span(request.start, request.end)?;
        let id = EventId::parse(&request.id)?;
        let event = Event::with_id(
            id,
            request.title.as_str(),
            request.start,
            request.end,
            request.description.as_str(),
        )?;
        Ok(self.repo.update_if_free(&event)?)
    }

    /// Removes an event permanently.
    ///
    /// # Errors
    /// - `InvalidIdentifier` when `id` is not a UUID.
    /// - `NotFound` when no event has this id.
    pub fn delete(&self, id: &str) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = EventId::parse(id)
            .map_err(EventServiceError::from)
            .and_then(|id| self.repo.delete_by_id(id).map_err(EventServiceError::from));
        log_outcome("event_delete", started_at, Some(id), &result);
        result
    }

    /// Reads one event by id.
    pub fn get(&self, id: &str) -> ServiceResult<EventView> {
        let parsed = EventId::parse(id)?;
        Ok(self.repo.find_by_id(parsed)?.into())
    }

    /// Events overlapping the calendar day of `day`, in `day`'s zone.
    pub fn list_day<Tz: TimeZone>(&self, day: &DateTime<Tz>) -> ServiceResult<Vec<EventView>> {
        self.list_period(CalendarPeriod::Day, day)
    }

    /// Events overlapping the ISO week (Monday first) of `day`.
    pub fn list_week<Tz: TimeZone>(&self, day: &DateTime<Tz>) -> ServiceResult<Vec<EventView>> {
        self.list_period(CalendarPeriod::Week, day)
    }

    /// Events overlapping the calendar month of `day`.
    pub fn list_month<Tz: TimeZone>(&self, day: &DateTime<Tz>) -> ServiceResult<Vec<EventView>> {
        self.list_period(CalendarPeriod::Month, day)
    }

    /// Unpaginated listing of the `period` containing `day`, ordered by start.
    pub fn list_period<Tz: TimeZone>(
        &self,
        period: CalendarPeriod,
        day: &DateTime<Tz>,
    ) -> ServiceResult<Vec<EventView>> {
        let started_at = Instant::now();
        let span = period.span(day);
        let result = self.list_span(&span, None);
        match &result {
            Ok(events) => info!(
                "event=event_list module=service status=ok period={} count={} duration_ms={}",
                period.as_str(),
                events.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=event_list module=service status=error period={} error_code={} duration_ms={}",
                period.as_str(),
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// One page (zero-based) of all events using the configured page size.
    pub fn list_all(&self, page: u32) -> ServiceResult<Vec<EventView>> {
        let events = self
            .repo
            .list_all(Some(Page::new(page, self.page_size)))?;
        Ok(events.into_iter().map(EventView::from).collect())
    }

    /// Events overlapping an arbitrary window, optionally paginated.
    pub fn list_span(&self, span: &TimeSpan, page: Option<Page>) -> ServiceResult<Vec<EventView>> {
        let events = self.repo.find_by_span(span, page)?;
        Ok(events.into_iter().map(EventView::from).collect())
    }
}

fn log_outcome<T>(
    op: &'static str,
    started_at: Instant,
    event_id: Option<&str>,
    result: &ServiceResult<T>,
) {
    let event_id = event_id.unwrap_or("-");
    match result {
        Ok(_) => info!(
            "event={} module=service status=ok event_id={} duration_ms={}",
            op,
            event_id,
            started_at.elapsed().as_millis()
        ),
        Err(EventServiceError::DateBusy(conflict)) => warn!(
            "event={} module=service status=error error_code=date_busy event_id={} conflict_id={} duration_ms={}",
            op,
            event_id,
            conflict,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=service status=error error_code={} event_id={} duration_ms={}",
            op,
            err.code(),
            event_id,
            started_at.elapsed().as_millis()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{EventServiceError, EventView};
    use crate::model::event::{Event, EventId};
    use crate::repo::event_repo::RepoError;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn repo_conflicts_map_to_date_busy() {
        let id = EventId::new();
        let err = EventServiceError::from(RepoError::SpanOccupied(id));
        assert_eq!(err.code(), "date_busy");
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn invalid_data_is_a_storage_failure() {
        let err = EventServiceError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(err.code(), "storage_failure");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn view_uses_hyphenated_id() {
        let start = Utc.with_ymd_and_hms(2022, 2, 2, 8, 0, 0).unwrap();
        let event = Event::new("dentist", start, start + Duration::hours(1), "").unwrap();
        let id = event.id;
        let view = EventView::from(event);
        assert_eq!(view.id, id.to_string());
        assert_eq!(view.id.len(), 36);
    }
}
