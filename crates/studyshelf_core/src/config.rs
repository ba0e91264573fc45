//! Runtime configuration for one data directory.
//!
//! # Responsibility
//! - Resolve where the metadata snapshot, item database and logs live.
//! - Normalize the requested log level.
//!
//! # Invariants
//! - `data_dir` is absolute.
//! - File names inside the data directory are fixed constants.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Metadata snapshot file inside the data directory.
pub const METADATA_FILE_NAME: &str = "studyshelf_state.json";
/// Item database file inside the data directory.
pub const ITEMS_DB_FILE_NAME: &str = "studyshelf_items.sqlite3";
/// Rolling log directory inside the data directory.
pub const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyDataDir,
    RelativeDataDir(String),
    UnsupportedLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDataDir => write!(f, "data_dir cannot be empty"),
            Self::RelativeDataDir(value) => {
                write!(f, "data_dir must be an absolute path, got `{value}`")
            }
            Self::UnsupportedLogLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected trace|debug|info|warn|error"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Resolved storage + logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizerConfig {
    data_dir: PathBuf,
    log_level: &'static str,
}

impl OrganizerConfig {
    /// Builds a config; `log_level = None` picks the build-mode default.
    pub fn new(data_dir: impl AsRef<Path>, log_level: Option<&str>) -> Result<Self, ConfigError> {
        let data_dir = normalize_data_dir(data_dir.as_ref())?;
        let log_level = match log_level {
            Some(level) => normalize_level(level)?,
            None => default_log_level(),
        };
        Ok(Self {
            data_dir,
            log_level,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE_NAME)
    }

    pub fn items_db_path(&self) -> PathBuf {
        self.data_dir.join(ITEMS_DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    pub fn log_level(&self) -> &'static str {
        self.log_level
    }
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, ConfigError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(ConfigError::UnsupportedLogLevel(other.to_string())),
    }
}

fn normalize_data_dir(data_dir: &Path) -> Result<PathBuf, ConfigError> {
    let text = data_dir.to_string_lossy();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyDataDir);
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(ConfigError::RelativeDataDir(trimmed.to_string()));
    }
    Ok(path.to_path_buf())
}
