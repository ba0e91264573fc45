//! Item (attachment) domain model.
//!
//! # Responsibility
//! - Define the attachment record stored in the item store.
//! - Keep kind-specific fields on the matching `ItemContent` variant.
//!
//! # Invariants
//! - `kind()` is derived from the content variant and cannot disagree with it.
//! - Items are never edited after creation; only inserted or deleted.

use crate::model::subject::SubjectId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable item identifier, unique across all kinds and subjects.
pub type ItemId = String;

/// Discriminator of the four attachment variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemKind {
    Notes,
    Files,
    Images,
    Audio,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [Self::Notes, Self::Files, Self::Images, Self::Audio];

    /// Stable storage/tab name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Files => "files",
            Self::Images => "images",
            Self::Audio => "audio",
        }
    }

    /// Parses a storage/tab name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "notes" => Some(Self::Notes),
            "files" => Some(Self::Files),
            "images" => Some(Self::Images),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific item fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    Note {
        text: String,
    },
    File {
        title: String,
        name: String,
        mime_type: String,
        payload: Vec<u8>,
    },
    Image {
        name: String,
        mime_type: String,
        payload: Vec<u8>,
    },
    Audio {
        name: String,
        mime_type: String,
        payload: Vec<u8>,
    },
}

impl ItemContent {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Note { .. } => ItemKind::Notes,
            Self::File { .. } => ItemKind::Files,
            Self::Image { .. } => ItemKind::Images,
            Self::Audio { .. } => ItemKind::Audio,
        }
    }

    /// Binary payload, `None` for notes.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Note { .. } => None,
            Self::File { payload, .. } | Self::Image { payload, .. } | Self::Audio { payload, .. } => {
                Some(payload.as_slice())
            }
        }
    }
}

/// One attachment owned by a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub subject_id: SubjectId,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub content: ItemContent,
}

impl Item {
    /// Creates an item with a generated id.
    pub fn new(subject_id: impl Into<SubjectId>, created_at: i64, content: ItemContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            created_at,
            content,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    /// Short human label: note text, file title, or media file name.
    pub fn label(&self) -> &str {
        match &self.content {
            ItemContent::Note { text } => text,
            ItemContent::File { title, .. } => title,
            ItemContent::Image { name, .. } | ItemContent::Audio { name, .. } => name,
        }
    }
}

/// Uploaded binary as handed over by an add dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub mime_type: String,
    pub payload: Vec<u8>,
}

/// Rejections from the add dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    BlankNote,
    MissingFileName,
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankNote => write!(f, "note text must not be blank"),
            Self::MissingFileName => write!(f, "uploaded file must have a name"),
        }
    }
}

impl Error for ItemValidationError {}

/// Note content from raw text; text is trimmed and must be non-empty.
pub fn note_content(text: &str) -> Result<ItemContent, ItemValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ItemValidationError::BlankNote);
    }
    Ok(ItemContent::Note {
        text: text.to_string(),
    })
}

/// File content; a blank `title` falls back to the upload's file name.
pub fn file_content(
    title: Option<&str>,
    upload: Upload,
) -> Result<ItemContent, ItemValidationError> {
    let name = checked_name(&upload)?;
    let title = title
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| name.clone(), str::to_string);
    Ok(ItemContent::File {
        title,
        name,
        mime_type: upload.mime_type,
        payload: upload.payload,
    })
}

pub fn image_content(upload: Upload) -> Result<ItemContent, ItemValidationError> {
    let name = checked_name(&upload)?;
    Ok(ItemContent::Image {
        name,
        mime_type: upload.mime_type,
        payload: upload.payload,
    })
}

pub fn audio_content(upload: Upload) -> Result<ItemContent, ItemValidationError> {
    let name = checked_name(&upload)?;
    Ok(ItemContent::Audio {
        name,
        mime_type: upload.mime_type,
        payload: upload.payload,
    })
}

fn checked_name(upload: &Upload) -> Result<String, ItemValidationError> {
    let name = upload.name.trim();
    if name.is_empty() {
        return Err(ItemValidationError::MissingFileName);
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::{file_content, note_content, ItemContent, ItemKind, ItemValidationError, Upload};

    fn upload(name: &str) -> Upload {
        Upload {
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            payload: vec![1, 2, 3],
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("videos"), None);
    }

    #[test]
    fn note_content_trims_and_rejects_blank() {
        assert_eq!(
            note_content("  hello \n").unwrap(),
            ItemContent::Note {
                text: "hello".to_string()
            }
        );
        assert_eq!(note_content(" \n ").unwrap_err(), ItemValidationError::BlankNote);
    }

    #[test]
    fn file_title_falls_back_to_file_name() {
        let untitled = file_content(Some("   "), upload("week1.pdf")).unwrap();
        assert!(matches!(untitled, ItemContent::File { ref title, .. } if title == "week1.pdf"));

        let titled = file_content(Some("Lecture 1"), upload("week1.pdf")).unwrap();
        assert!(matches!(titled, ItemContent::File { ref title, .. } if title == "Lecture 1"));
        assert_eq!(titled.payload(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn upload_without_name_is_rejected() {
        let err = file_content(None, upload("  ")).unwrap_err();
        assert_eq!(err, ItemValidationError::MissingFileName);
    }
}
