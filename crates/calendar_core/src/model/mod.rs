//! Domain model for calendar scheduling.
//!
//! # Responsibility
//! - Define the canonical event record, identifier and span types.
//!
//! # Invariants
//! - Every event is identified by a stable `EventId`.
//! - Deletion is a hard delete; no tombstones are kept.

pub mod event;
