//! Calendar use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into request/response level APIs.
//! - Keep CLI and future transports decoupled from storage details.

pub mod event_service;
