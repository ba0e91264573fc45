//! Metadata store: subject list plus selected subject id.
//!
//! # Responsibility
//! - Persist `{subjects, selectedSubjectId}` as one serialized JSON blob.
//! - Load the last snapshot, degrading to an empty default when absent or
//!   corrupt, and surfacing every other read failure.
//!
//! # Invariants
//! - Single key, last write wins; no partial-write protection.
//! - A corrupt snapshot (bad JSON or non-UTF-8 bytes) is logged and treated
//!   as "no data yet", never propagated.
//! - An unreadable snapshot is `StorageUnavailable`; it is never replaced by
//!   the default, so a later save cannot clobber it.
//! - Callers save immediately after every mutation.

use crate::model::subject::{Subject, SubjectId};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Persisted metadata shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSnapshot {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub selected_subject_id: Option<SubjectId>,
}

/// Metadata store failures.
#[derive(Debug)]
pub enum MetadataStoreError {
    /// Snapshot cannot be read or written (permissions, disk full, I/O).
    StorageUnavailable {
        location: String,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
}

impl Display for MetadataStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable { location, source } => {
                write!(f, "metadata storage unavailable at `{location}`: {source}")
            }
            Self::Encode(err) => write!(f, "failed to encode metadata snapshot: {err}"),
        }
    }
}

impl Error for MetadataStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for MetadataStoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Storage contract for the metadata snapshot.
pub trait MetadataStore {
    /// Reads the persisted snapshot, or the empty default when absent or
    /// corrupt.
    fn load(&self) -> Result<MetadataSnapshot, MetadataStoreError>;
    /// Replaces the persisted snapshot.
    fn save(&self, snapshot: &MetadataSnapshot) -> Result<(), MetadataStoreError>;
}

/// JSON-file-backed metadata store.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    path: PathBuf,
}

impl FileMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for FileMetadataStore {
    fn load(&self) -> Result<MetadataSnapshot, MetadataStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(decode_snapshot(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("event=metadata_load module=repo status=ok source=file found=false");
                Ok(MetadataSnapshot::default())
            }
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                warn!(
                    "event=metadata_load module=repo status=error source=file error_code=corrupt_metadata fallback=empty error={err}"
                );
                Ok(MetadataSnapshot::default())
            }
            Err(err) => {
                error!(
                    "event=metadata_load module=repo status=error source=file error_code=read_failed error={err}"
                );
                Err(MetadataStoreError::StorageUnavailable {
                    location: self.path.display().to_string(),
                    source: err,
                })
            }
        }
    }

    fn save(&self, snapshot: &MetadataSnapshot) -> Result<(), MetadataStoreError> {
        let encoded = serde_json::to_string(snapshot)?;
        let unavailable = |source| MetadataStoreError::StorageUnavailable {
            location: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        std::fs::write(&self.path, encoded).map_err(unavailable)?;
        Ok(())
    }
}

/// In-process metadata store holding the serialized blob.
///
/// Behaves like the file store, including corrupt-blob fallback, which makes
/// it suitable for tests and for callers that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    raw: RefCell<Option<String>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with an arbitrary (possibly corrupt) blob.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: RefCell::new(Some(raw.into())),
        }
    }

    /// Current serialized blob, if any save happened.
    pub fn raw(&self) -> Option<String> {
        self.raw.borrow().clone()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load(&self) -> Result<MetadataSnapshot, MetadataStoreError> {
        Ok(match self.raw.borrow().as_deref() {
            Some(raw) => decode_snapshot(raw),
            None => MetadataSnapshot::default(),
        })
    }

    fn save(&self, snapshot: &MetadataSnapshot) -> Result<(), MetadataStoreError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.raw.replace(Some(encoded));
        Ok(())
    }
}

fn decode_snapshot(raw: &str) -> MetadataSnapshot {
    match serde_json::from_str::<MetadataSnapshot>(raw) {
        Ok(snapshot) => {
            info!(
                "event=metadata_load module=repo status=ok found=true subjects={}",
                snapshot.subjects.len()
            );
            snapshot
        }
        Err(err) => {
            warn!(
                "event=metadata_load module=repo status=error error_code=corrupt_metadata fallback=empty error={err}"
            );
            MetadataSnapshot::default()
        }
    }
}
