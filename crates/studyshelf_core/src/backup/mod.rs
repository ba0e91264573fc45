//! Portable subject backups.
//!
//! # Responsibility
//! - Export the subject list as a versioned JSON document.
//! - Validate and decode imported documents.
//!
//! # Invariants
//! - Backups carry subject metadata only; items and payloads never
//!   round-trip through a backup.

pub mod codec;
