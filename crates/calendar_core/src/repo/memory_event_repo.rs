//! Process-local event store.
//!
//! # Invariants
//! - One mutex guards the whole map; every read and write takes it.
//! - Conditional writes check and insert under the same guard.

use crate::model::event::{Event, EventId, TimeSpan};
use crate::repo::event_repo::{
    paginate, sort_for_listing, EventRepository, Page, RepoError, RepoResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory event repository backed by a `HashMap`.
///
/// State lives for the lifetime of the value; nothing is persisted.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<EventId, Event>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn first_overlapping_in(
    events: &HashMap<EventId, Event>,
    span: &TimeSpan,
    exclude: Option<EventId>,
) -> Option<EventId> {
    events
        .values()
        .filter(|event| Some(event.id) != exclude && event.span().overlaps(span))
        .min_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)))
        .map(|event| event.id)
}

fn insert_new(events: &mut HashMap<EventId, Event>, event: &Event) -> RepoResult<EventId> {
    if events.contains_key(&event.id) {
        return Err(RepoError::AlreadyExists(event.id));
    }
    events.insert(event.id, event.clone());
    Ok(event.id)
}

fn replace_existing(events: &mut HashMap<EventId, Event>, event: &Event) -> RepoResult<()> {
    match events.get_mut(&event.id) {
        Some(stored) => {
            *stored = event.clone();
            Ok(())
        }
        None => Err(RepoError::NotFound(event.id)),
    }
}

impl EventRepository for InMemoryEventRepository {
    fn create(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;
        insert_new(&mut self.events.lock(), event)
    }

    fn update(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;
        replace_existing(&mut self.events.lock(), event)
    }

    fn find_by_id(&self, id: EventId) -> RepoResult<Event> {
        self.events
            .lock()
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound(id))
    }

    fn delete_by_id(&self, id: EventId) -> RepoResult<()> {
        self.events
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(id))
    }

    fn find_by_span(&self, span: &TimeSpan, page: Option<Page>) -> RepoResult<Vec<Event>> {
        let mut matches: Vec<Event> = self
            .events
            .lock()
            .values()
            .filter(|event| event.span().overlaps(span))
            .cloned()
            .collect();
        sort_for_listing(&mut matches);
        Ok(paginate(matches, page))
    }

    fn list_all(&self, page: Option<Page>) -> RepoResult<Vec<Event>> {
        let mut all: Vec<Event> = self.events.lock().values().cloned().collect();
        sort_for_listing(&mut all);
        Ok(paginate(all, page))
    }

    fn first_overlapping(
        &self,
        span: &TimeSpan,
        exclude: Option<EventId>,
    ) -> RepoResult<Option<EventId>> {
        Ok(first_overlapping_in(&self.events.lock(), span, exclude))
    }

    fn create_if_free(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;
        let mut events = self.events.lock();
        if let Some(conflict) = first_overlapping_in(&events, &event.span(), None) {
            return Err(RepoError::SpanOccupied(conflict));
        }
        insert_new(&mut events, event)
    }

    fn update_if_free(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;
        let mut events = self.events.lock();
        if let Some(conflict) = first_overlapping_in(&events, &event.span(), Some(event.id)) {
            return Err(RepoError::SpanOccupied(conflict));
        }
        replace_existing(&mut events, event)
    }
}
