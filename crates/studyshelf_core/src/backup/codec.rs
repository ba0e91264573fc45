//! Backup document codec.
//!
//! # Responsibility
//! - Build `{subjects, version, exportedAt}` documents.
//! - Decode imported text into a subject list or `ImportError`.
//!
//! # Invariants
//! - Import is pure: it never mutates stores. Installing the result is a
//!   full replace owned by the caller, after user confirmation.
//! - A document whose `subjects` is missing or not an array is rejected.
//! - Subject ids in an accepted document are unique.

use crate::db::migrations::latest_version;
use crate::model::subject::Subject;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const BACKUP_FILE_PREFIX: &str = "studyshelf-backup";

/// Exported backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub subjects: Vec<Subject>,
    /// Item-store schema version at export time.
    pub version: u32,
    /// ISO-8601 UTC, millisecond precision.
    pub exported_at: String,
}

/// Import rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    InvalidFormat(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(reason) => write!(f, "invalid backup format: {reason}"),
        }
    }
}

impl Error for ImportError {}

/// Builds a backup document for the given subjects.
pub fn export_backup(subjects: &[Subject], exported_at: DateTime<Utc>) -> BackupDocument {
    BackupDocument {
        subjects: subjects.to_vec(),
        version: latest_version(),
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Serializes a backup document as compact UTF-8 JSON.
pub fn to_json(document: &BackupDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string(document)
}

/// Decodes backup text into the subject list to install.
///
/// Only `subjects` is validated: it must be an array of subject records.
/// `version` and `exportedAt` are informational.
pub fn import_backup(text: &str) -> Result<Vec<Subject>, ImportError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|err| ImportError::InvalidFormat(format!("not valid JSON: {err}")))?;

    let subjects = match root.get("subjects") {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(ImportError::InvalidFormat(
                "`subjects` must be an array".to_string(),
            ))
        }
        None => {
            return Err(ImportError::InvalidFormat(
                "missing `subjects` field".to_string(),
            ))
        }
    };

    let mut seen = HashSet::new();
    subjects
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let subject = Subject::deserialize(entry).map_err(|err| {
                ImportError::InvalidFormat(format!("subjects[{index}] is not a subject: {err}"))
            })?;
            if !seen.insert(subject.id.clone()) {
                return Err(ImportError::InvalidFormat(format!(
                    "subjects[{index}] repeats id `{}`",
                    subject.id
                )));
            }
            Ok(subject)
        })
        .collect()
}

/// Suggested download name, e.g. `studyshelf-backup-2026-10-17.json`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("{BACKUP_FILE_PREFIX}-{}.json", date.format("%Y-%m-%d"))
}
