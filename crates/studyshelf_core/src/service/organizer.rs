//! Organizer use-case service.
//!
//! # Responsibility
//! - Hold application state: subjects, selected subject, selection session.
//! - Keep the metadata store and the item store consistent with each other
//!   (cascade delete, orphan sweep).
//! - Validate form input before anything is persisted.
//!
//! # Invariants
//! - In-memory state changes only after the metadata save succeeds.
//! - Items are only created for subjects present in the subject list.
//! - A cascade that fails after the metadata save is reported as
//!   `PartialCascadeFailure`, never as success.

use crate::backup::codec::{self, BackupDocument, ImportError};
use crate::model::item::{
    audio_content, file_content, image_content, note_content, Item, ItemContent, ItemKind,
    ItemValidationError, Upload,
};
use crate::model::subject::{Subject, SubjectDraft, SubjectId, SubjectValidationError};
use crate::repo::item_repo::{ItemStore, RepoError};
use crate::repo::metadata_repo::{MetadataSnapshot, MetadataStore, MetadataStoreError};
use crate::selection::controller::{PendingDelete, SelectionController};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrganizerResult<T> = Result<T, OrganizerError>;

/// Errors from organizer use cases.
#[derive(Debug)]
pub enum OrganizerError {
    InvalidSubject(SubjectValidationError),
    InvalidItem(ItemValidationError),
    SubjectNotFound(SubjectId),
    Metadata(MetadataStoreError),
    Items(RepoError),
    Import(ImportError),
    /// Subject is gone from metadata but its items could not be removed.
    PartialCascadeFailure {
        subject_id: SubjectId,
        source: RepoError,
    },
}

impl OrganizerError {
    /// Whether the underlying medium could not be used at all.
    pub fn is_storage_unavailable(&self) -> bool {
        match self {
            Self::Metadata(MetadataStoreError::StorageUnavailable { .. }) => true,
            Self::Items(err) | Self::PartialCascadeFailure { source: err, .. } => {
                err.is_storage_unavailable()
            }
            _ => false,
        }
    }
}

impl Display for OrganizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubject(err) => write!(f, "{err}"),
            Self::InvalidItem(err) => write!(f, "{err}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::Metadata(err) => write!(f, "{err}"),
            Self::Items(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::PartialCascadeFailure { subject_id, source } => write!(
                f,
                "subject {subject_id} was removed but its items were not: {source}"
            ),
        }
    }
}

impl Error for OrganizerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSubject(err) => Some(err),
            Self::InvalidItem(err) => Some(err),
            Self::SubjectNotFound(_) => None,
            Self::Metadata(err) => Some(err),
            Self::Items(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::PartialCascadeFailure { source, .. } => Some(source),
        }
    }
}

impl From<SubjectValidationError> for OrganizerError {
    fn from(value: SubjectValidationError) -> Self {
        Self::InvalidSubject(value)
    }
}

impl From<ItemValidationError> for OrganizerError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidItem(value)
    }
}

impl From<MetadataStoreError> for OrganizerError {
    fn from(value: MetadataStoreError) -> Self {
        Self::Metadata(value)
    }
}

impl From<RepoError> for OrganizerError {
    fn from(value: RepoError) -> Self {
        Self::Items(value)
    }
}

impl From<ImportError> for OrganizerError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

/// Outcome of a backup import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Subjects were replaced; carries the installed count.
    Installed(usize),
    /// The caller declined the destructive replace.
    Declined,
}

/// Application state plus the two store handles.
pub struct Organizer<M: MetadataStore, I: ItemStore> {
    metadata: M,
    items: I,
    subjects: Vec<Subject>,
    selected_subject_id: Option<SubjectId>,
    selection: SelectionController,
}

impl<M: MetadataStore, I: ItemStore> Organizer<M, I> {
    /// Loads the metadata snapshot and takes ownership of both stores.
    ///
    /// A selected id that no longer resolves is dropped.
    ///
    /// # Errors
    /// - `Metadata` when the snapshot exists but cannot be read.
    pub fn open(metadata: M, items: I) -> OrganizerResult<Self> {
        let snapshot = metadata.load().inspect_err(|err| {
            error!("event=organizer_open module=service status=error error={err}");
        })?;
        let selected_subject_id = snapshot
            .selected_subject_id
            .filter(|id| snapshot.subjects.iter().any(|subject| &subject.id == id));
        Ok(Self {
            metadata,
            items,
            subjects: snapshot.subjects,
            selected_subject_id,
            selection: SelectionController::new(),
        })
    }

    pub fn item_store(&self) -> &I {
        &self.items
    }

    pub fn metadata_store(&self) -> &M {
        &self.metadata
    }

    /// Subjects in creation order.
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn subject(&self, subject_id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|subject| subject.id == subject_id)
    }

    /// Subjects matching the home-screen search rule.
    pub fn search_subjects(&self, query: &str) -> Vec<&Subject> {
        self.subjects
            .iter()
            .filter(|subject| subject.matches_query(query))
            .collect()
    }

    pub fn create_subject(&mut self, draft: &SubjectDraft) -> OrganizerResult<Subject> {
        let subject = Subject::create(draft)?;
        let mut subjects = self.subjects.clone();
        subjects.push(subject.clone());
        self.persist(subjects, self.selected_subject_id.clone())?;

        info!(
            "event=subject_create module=service status=ok subject_id={}",
            subject.id
        );
        Ok(subject)
    }

    pub fn edit_subject(
        &mut self,
        subject_id: &str,
        draft: &SubjectDraft,
    ) -> OrganizerResult<Subject> {
        let mut subjects = self.subjects.clone();
        let target = subjects
            .iter_mut()
            .find(|subject| subject.id == subject_id)
            .ok_or_else(|| OrganizerError::SubjectNotFound(subject_id.to_string()))?;
        target.apply(draft)?;
        let updated = target.clone();
        self.persist(subjects, self.selected_subject_id.clone())?;

        info!("event=subject_edit module=service status=ok subject_id={subject_id}");
        Ok(updated)
    }

    /// Opens a subject; persisted so the next launch reopens it.
    pub fn select_subject(&mut self, subject_id: &str) -> OrganizerResult<&Subject> {
        if self.subject(subject_id).is_none() {
            return Err(OrganizerError::SubjectNotFound(subject_id.to_string()));
        }
        self.selection.cancel();
        self.persist(self.subjects.clone(), Some(subject_id.to_string()))?;
        self.subject(subject_id)
            .ok_or_else(|| OrganizerError::SubjectNotFound(subject_id.to_string()))
    }

    /// Returns to the home screen.
    pub fn clear_selected_subject(&mut self) -> OrganizerResult<()> {
        self.selection.cancel();
        self.persist(self.subjects.clone(), None)
    }

    pub fn selected_subject_id(&self) -> Option<&str> {
        self.selected_subject_id.as_deref()
    }

    pub fn selected_subject(&self) -> Option<&Subject> {
        self.selected_subject_id
            .as_deref()
            .and_then(|id| self.subject(id))
    }

    /// Removes a subject, then every item it owns.
    ///
    /// Returns the number of removed items.
    ///
    /// # Errors
    /// - `SubjectNotFound` / `Metadata`: nothing changed.
    /// - `PartialCascadeFailure`: the subject is gone, its items remain until
    ///   `sweep_orphans` runs.
    pub fn delete_subject(&mut self, subject_id: &str) -> OrganizerResult<usize> {
        if self.subject(subject_id).is_none() {
            return Err(OrganizerError::SubjectNotFound(subject_id.to_string()));
        }

        let subjects = self
            .subjects
            .iter()
            .filter(|subject| subject.id != subject_id)
            .cloned()
            .collect();
        let selected = self
            .selected_subject_id
            .clone()
            .filter(|selected| selected != subject_id);
        self.persist(subjects, selected)?;
        self.selection.cancel();

        match self.items.delete_by_subject(subject_id) {
            Ok(removed) => {
                info!(
                    "event=subject_delete module=service status=ok subject_id={subject_id} items_removed={removed}"
                );
                Ok(removed)
            }
            Err(err) => {
                error!(
                    "event=subject_delete module=service status=error error_code=partial_cascade subject_id={subject_id} error={err}"
                );
                Err(OrganizerError::PartialCascadeFailure {
                    subject_id: subject_id.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Stores one item for an existing subject at an explicit timestamp.
    pub fn add_item(
        &self,
        subject_id: &str,
        content: ItemContent,
        created_at: i64,
    ) -> OrganizerResult<Item> {
        if self.subject(subject_id).is_none() {
            return Err(OrganizerError::SubjectNotFound(subject_id.to_string()));
        }

        let item = Item::new(subject_id, created_at, content);
        self.items.add(&item)?;
        info!(
            "event=item_add module=service status=ok kind={} payload_bytes={}",
            item.kind(),
            item.content.payload().map_or(0, <[u8]>::len)
        );
        Ok(item)
    }

    pub fn add_note(&self, subject_id: &str, text: &str) -> OrganizerResult<Item> {
        self.add_item(subject_id, note_content(text)?, now_millis())
    }

    pub fn add_file(
        &self,
        subject_id: &str,
        title: Option<&str>,
        upload: Upload,
    ) -> OrganizerResult<Item> {
        self.add_item(subject_id, file_content(title, upload)?, now_millis())
    }

    pub fn add_image(&self, subject_id: &str, upload: Upload) -> OrganizerResult<Item> {
        self.add_item(subject_id, image_content(upload)?, now_millis())
    }

    pub fn add_audio(&self, subject_id: &str, upload: Upload) -> OrganizerResult<Item> {
        self.add_item(subject_id, audio_content(upload)?, now_millis())
    }

    /// One subject tab, newest first.
    pub fn list_items(&self, subject_id: &str, kind: ItemKind) -> OrganizerResult<Vec<Item>> {
        Ok(self.items.query_by_subject_and_kind(subject_id, kind)?)
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionController {
        &mut self.selection
    }

    /// Runs a confirmed batch delete from the current selection session.
    pub fn delete_selected(&mut self, pending: PendingDelete) -> OrganizerResult<usize> {
        Ok(self.selection.commit_delete(pending, &mut self.items)?)
    }

    pub fn export_backup(&self, exported_at: DateTime<Utc>) -> BackupDocument {
        let document = codec::export_backup(&self.subjects, exported_at);
        info!(
            "event=backup_export module=service status=ok subjects={}",
            document.subjects.len()
        );
        document
    }

    /// Validates `text`, asks `confirm(subject_count)`, then replaces all
    /// subjects. Items are left untouched.
    pub fn import_backup(
        &mut self,
        text: &str,
        confirm: impl FnOnce(usize) -> bool,
    ) -> OrganizerResult<ImportOutcome> {
        let subjects = codec::import_backup(text).inspect_err(|_| {
            warn!("event=backup_import module=service status=error error_code=invalid_format");
        })?;
        if !confirm(subjects.len()) {
            info!("event=backup_import module=service status=declined");
            return Ok(ImportOutcome::Declined);
        }

        let count = subjects.len();
        let selected = self
            .selected_subject_id
            .clone()
            .filter(|id| subjects.iter().any(|subject| &subject.id == id));
        self.persist(subjects, selected)?;
        self.selection.cancel();

        info!("event=backup_import module=service status=ok subjects={count}");
        Ok(ImportOutcome::Installed(count))
    }

    /// Deletes items whose owning subject no longer exists.
    ///
    /// Recovery path for `PartialCascadeFailure` and for subjects dropped by
    /// a backup import.
    pub fn sweep_orphans(&mut self) -> OrganizerResult<usize> {
        let known = self
            .subjects
            .iter()
            .map(|subject| subject.id.as_str())
            .collect::<HashSet<_>>();
        let orphaned = self
            .items
            .subject_ids()?
            .into_iter()
            .filter(|id| !known.contains(id.as_str()))
            .collect::<Vec<_>>();

        let mut removed = 0;
        for subject_id in &orphaned {
            removed += self.items.delete_by_subject(subject_id)?;
        }

        info!(
            "event=orphan_sweep module=service status=ok subjects={} items_removed={removed}",
            orphaned.len()
        );
        Ok(removed)
    }

    fn persist(
        &mut self,
        subjects: Vec<Subject>,
        selected_subject_id: Option<SubjectId>,
    ) -> OrganizerResult<()> {
        let snapshot = MetadataSnapshot {
            subjects,
            selected_subject_id,
        };
        if let Err(err) = self.metadata.save(&snapshot) {
            error!("event=metadata_save module=service status=error error={err}");
            return Err(err.into());
        }
        self.subjects = snapshot.subjects;
        self.selected_subject_id = snapshot.selected_subject_id;
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
