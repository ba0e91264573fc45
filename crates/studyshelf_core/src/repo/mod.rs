//! Persistence layer: the two independent stores.
//!
//! # Responsibility
//! - `item_repo`: attachment records and binary payloads (SQLite).
//! - `metadata_repo`: subject list and selected subject (one JSON snapshot).
//!
//! # Invariants
//! - Neither store knows about the other; cross-store consistency (cascade
//!   delete, orphan sweep) is orchestrated by `service::organizer`.
//! - Store handles are created once at startup and passed in explicitly.

pub mod item_repo;
pub mod metadata_repo;
