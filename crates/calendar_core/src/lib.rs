//! Calendar scheduling core.
//! Owns event validation, the no-overlap rule and calendar period math.

pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use calendar::{day_range, end_of_day, month_range, start_of_day, week_range, CalendarPeriod};
pub use config::{CalendarConfig, ConfigError, StorageBackend, DEFAULT_PAGE_SIZE};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::event::{Event, EventId, EventIdParseError, EventValidationError, TimeSpan};
pub use repo::event_repo::{EventRepository, Page, RepoError, RepoResult};
pub use repo::memory_event_repo::InMemoryEventRepository;
pub use repo::open_repository;
pub use repo::sqlite_event_repo::SqliteEventRepository;
pub use service::event_service::{
    CreateEventRequest, EventService, EventServiceError, EventView, ServiceResult,
    UpdateEventRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
