//! Core use-case services.
//!
//! # Responsibility
//! - Own application state explicitly instead of process-wide globals.
//! - Orchestrate the metadata store and the item store into use cases.
//! - Keep CLI/UI layers decoupled from storage details.

pub mod organizer;
