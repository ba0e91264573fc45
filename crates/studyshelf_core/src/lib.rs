//! Core domain logic for StudyShelf.
//! This crate is the single source of truth for storage invariants: subject
//! metadata and item payloads live in two independent stores kept consistent
//! here.

pub mod backup;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod selection;
pub mod service;

pub use backup::codec::{backup_file_name, BackupDocument, ImportError};
pub use config::{default_log_level, ConfigError, OrganizerConfig};
pub use logging::{init_logging, logging_status, LoggingError};
pub use model::item::{Item, ItemContent, ItemId, ItemKind, ItemValidationError, Upload};
pub use model::subject::{Subject, SubjectDraft, SubjectId, SubjectValidationError};
pub use repo::item_repo::{ItemStore, RepoError, RepoResult, SqliteItemStore};
pub use repo::metadata_repo::{
    FileMetadataStore, MemoryMetadataStore, MetadataSnapshot, MetadataStore, MetadataStoreError,
};
pub use selection::controller::{
    PendingDelete, SelectionController, SelectionState, ToggleOutcome, LONG_PRESS_THRESHOLD,
};
pub use service::organizer::{ImportOutcome, Organizer, OrganizerError, OrganizerResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
