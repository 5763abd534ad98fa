//! Error types for workspace operations
//!
//! Provides error handling for:
//! - Folder structure checks (expected folder or file missing)
//! - Storage IO (permission denied, handle invalidated mid-session)
//! - Reconciliation conflicts (ambiguous or unusable natural keys)
//! - Annotation lookups against an open table
//!
//! Nothing here is fatal to the process; every error is scoped to the
//! operation that raised it and the caller may retry.

use annofork_table::{ParseError, ReviewerError, TableError};
use std::path::PathBuf;

/// Expected folder or file is missing
///
/// Each variant carries the path that was looked for, relative to the
/// dataset root, so the message can point at it directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    /// `Users/` does not exist
    #[error("missing users folder: {}", .0.display())]
    MissingUsersFolder(PathBuf),

    /// `Users/<reviewer>/` does not exist
    #[error("missing reviewer folder: {}", .0.display())]
    MissingReviewerFolder(PathBuf),

    /// A `Data/` folder does not exist
    #[error("missing data folder: {}", .0.display())]
    MissingDataFolder(PathBuf),

    /// `TrajectoriesToAnalyse/<author>.csv` does not exist
    #[error("missing trajectory file: {}", .0.display())]
    MissingTrajectoryFile(PathBuf),
}

impl StructureError {
    /// The missing path
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::MissingUsersFolder(p)
            | Self::MissingReviewerFolder(p)
            | Self::MissingDataFolder(p)
            | Self::MissingTrajectoryFile(p) => p,
        }
    }
}

/// Storage-level failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying IO failed
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path escapes the dataset root or is not relative
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// File content is not UTF-8 text
    #[error("{} is not valid UTF-8", .0.display())]
    NotText(PathBuf),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the whole operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Natural-key problems during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    /// Two rows in one table share a key
    #[error("duplicate key {key:?} in {}", .path.display())]
    DuplicateKey { path: PathBuf, key: Vec<String> },

    /// A required key field is absent
    #[error("key field '{field}' missing from {}", .path.display())]
    MissingKeyField { path: PathBuf, field: String },
}

/// Lookups against an open annotation table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    /// No row matches the natural key
    #[error("no row for key {0}")]
    UnknownRow(String),

    /// Key kind does not fit the table (author key on a trajectory file etc.)
    #[error("key {key} cannot address a {table} table")]
    KeyKind { key: String, table: &'static str },

    /// Structured judgments only exist on trajectory tables
    #[error("structured judgments are only stored in trajectory tables")]
    NotTrajectory,

    /// Underlying table misuse
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Combined workspace error
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("annotation error: {0}")]
    Annotation(#[from] AnnotationError),

    #[error("invalid reviewer: {0}")]
    Reviewer(#[from] ReviewerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Fork refused because the reviewer already has a workspace
    #[error("workspace for reviewer '{0}' already exists")]
    WorkspaceExists(String),

    /// Cancelled between files
    #[error("operation cancelled")]
    Cancelled,
}

impl WorkspaceError {
    /// Attach a file path to a parse error
    pub fn parse(path: impl Into<PathBuf>, source: ParseError) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Check if the error may clear up on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Cancelled => true,
            _ => false,
        }
    }
}

/// Result type alias for workspace operations
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_error_names_path() {
        let err = StructureError::MissingReviewerFolder(PathBuf::from("Users/bob"));
        assert_eq!(err.to_string(), "missing reviewer folder: Users/bob");
        assert_eq!(err.path(), &PathBuf::from("Users/bob"));
    }

    #[test]
    fn error_conversions() {
        let err: WorkspaceError = StructureError::MissingDataFolder(PathBuf::from("Data")).into();
        assert!(matches!(err, WorkspaceError::Structure(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn io_errors_are_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WorkspaceError = StorageError::io_error("Data/users.csv", io).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Data/users.csv"));
    }

    #[test]
    fn parse_error_names_file() {
        let err = WorkspaceError::parse(
            "Data/users.csv",
            ParseError::MalformedHeader("line 1: missing closing quote".into()),
        );
        assert!(err.to_string().starts_with("parse error in Data/users.csv"));
    }
}
