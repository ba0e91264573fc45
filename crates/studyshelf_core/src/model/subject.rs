//! Subject domain model.
//!
//! # Responsibility
//! - Define the study-topic record held by the metadata store.
//! - Validate user-entered fields before they are persisted.
//! - Provide display helpers derived from stored fields.
//!
//! # Invariants
//! - `id` is stable and immutable after creation.
//! - `color` is stored as opaque `#RRGGBB`; translucent variants are derived.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable subject identifier.
///
/// Plain string: backups written by older builds carry short non-UUID ids.
pub type SubjectId = String;

pub const DEFAULT_SUBJECT_ICON: &str = "📘";
pub const DEFAULT_SUBJECT_MOOD: &str = "😀";
pub const DEFAULT_SUBJECT_COLOR: &str = "#7E57C2";

const FALLBACK_RGB: (u8, u8, u8) = (0x7E, 0x57, 0xC2);

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{6})$").expect("valid hex color regex"));

/// User-defined study topic that owns items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub icon: String,
    pub mood: String,
    /// `#RRGGBB`.
    pub color: String,
}

/// Editable subject fields, as submitted by the create/edit forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDraft {
    pub name: String,
    pub icon: String,
    pub mood: String,
    pub color: String,
}

impl Default for SubjectDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            icon: DEFAULT_SUBJECT_ICON.to_string(),
            mood: DEFAULT_SUBJECT_MOOD.to_string(),
            color: DEFAULT_SUBJECT_COLOR.to_string(),
        }
    }
}

impl SubjectDraft {
    /// Draft with the given name and default icon/mood/color.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns trimmed name and normalized color, or the first invalid field.
    pub fn normalized(&self) -> Result<SubjectDraft, SubjectValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SubjectValidationError::BlankName);
        }
        let color = normalize_color(&self.color)
            .ok_or_else(|| SubjectValidationError::InvalidColor(self.color.clone()))?;

        Ok(SubjectDraft {
            name: name.to_string(),
            icon: self.icon.clone(),
            mood: self.mood.clone(),
            color,
        })
    }
}

/// Validation errors for subject form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectValidationError {
    BlankName,
    InvalidColor(String),
}

impl Display for SubjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "subject name must not be blank"),
            Self::InvalidColor(value) => {
                write!(f, "subject color must be #RRGGBB, got `{value}`")
            }
        }
    }
}

impl Error for SubjectValidationError {}

impl Subject {
    /// Creates a subject with a freshly generated id from a validated draft.
    pub fn create(draft: &SubjectDraft) -> Result<Self, SubjectValidationError> {
        let draft = draft.normalized()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            icon: draft.icon,
            mood: draft.mood,
            color: draft.color,
        })
    }

    /// Replaces mutable fields. `id` is untouched.
    pub fn apply(&mut self, draft: &SubjectDraft) -> Result<(), SubjectValidationError> {
        let draft = draft.normalized()?;
        self.name = draft.name;
        self.icon = draft.icon;
        self.mood = draft.mood;
        self.color = draft.color;
        Ok(())
    }

    /// Search rule used by the home screen filter.
    ///
    /// Case-insensitive on `name`, literal on `mood`. Blank query matches all.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query) || self.mood.contains(&query)
    }

    /// CSS `rgba(...)` form of `color` with the given alpha.
    ///
    /// Unparsable colors fall back to the default purple channels.
    pub fn translucent_color(&self, alpha: f32) -> String {
        let (r, g, b) = parse_rgb(&self.color).unwrap_or(FALLBACK_RGB);
        format!("rgba({r},{g},{b},{alpha})")
    }
}

/// Normalizes `RRGGBB` / `#RRGGBB` into `#RRGGBB`, preserving digit case.
pub fn normalize_color(value: &str) -> Option<String> {
    HEX_COLOR_RE
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|digits| format!("#{}", digits.as_str()))
}

fn parse_rgb(value: &str) -> Option<(u8, u8, u8)> {
    let normalized = normalize_color(value)?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&normalized[range], 16).ok();
    Some((channel(1..3)?, channel(3..5)?, channel(5..7)?))
}
