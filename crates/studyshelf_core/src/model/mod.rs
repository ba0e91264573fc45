//! Domain model for subjects and their attachments.
//!
//! # Responsibility
//! - Define the records persisted by the metadata store and the item store.
//! - Keep kind-specific item fields on the matching variant only.
//!
//! # Invariants
//! - Subject and item ids are generated once and never reused.
//! - An item always belongs to exactly one subject.

pub mod item;
pub mod subject;
