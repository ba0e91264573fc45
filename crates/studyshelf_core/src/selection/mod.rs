//! Multi-item selection for batch deletion.
//!
//! # Responsibility
//! - Track the transient set of selected item ids of one selection session.
//! - Turn a confirmed batch delete into one item-store call.
//!
//! # Invariants
//! - Selection state is never persisted.
//! - Only the item store is mutated from here, never the metadata store.

pub mod controller;
