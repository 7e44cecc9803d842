//! Event storage contracts and implementations.
//!
//! # Responsibility
//! - Define the `EventRepository` contract used by the service layer.
//! - Keep SQL and locking details out of business orchestration.
//!
//! # Invariants
//! - Repository writes call `Event::validate()` before persisting.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`,
//!   `SpanOccupied`) in addition to storage failures.

pub mod event_repo;
pub mod memory_event_repo;
pub mod sqlite_event_repo;

use crate::config::{StorageBackend, StorageConfig};
use event_repo::{EventRepository, RepoResult};
use log::info;
use memory_event_repo::InMemoryEventRepository;
use sqlite_event_repo::SqliteEventRepository;

/// Builds the repository selected by `config`.
///
/// # Errors
/// - Propagates database open and migration failures for the sqlite backend.
pub fn open_repository(config: &StorageConfig) -> RepoResult<Box<dyn EventRepository>> {
    let repo: Box<dyn EventRepository> = match config.backend {
        StorageBackend::Memory => Box::new(InMemoryEventRepository::new()),
        StorageBackend::Sqlite => Box::new(SqliteEventRepository::open(&config.path)?),
    };
    info!(
        "event=repo_open module=repo status=ok backend={}",
        match config.backend {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    );
    Ok(repo)
}
