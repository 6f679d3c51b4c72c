//! Error types for scanning, persistence and comparison.

use std::fmt;

use changescan_common::PathError;
use thiserror::Error;

/// Errors raised by the scanning engine.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// IO error while touching a path.
    #[error("IO error at {path}: {source}")]
    IoError {
        /// Path where the error occurred.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Path exists but is not a regular file.
    #[error("Not a regular file: {path}")]
    NotAFile {
        /// The offending path.
        path: String,
    },

    /// Path is longer than the platform accepts.
    #[error("Path exceeds {limit} bytes ({length}): {path}")]
    PathTooLong {
        /// The offending path.
        path: String,
        /// Its length in bytes.
        length: usize,
        /// Platform limit in bytes.
        limit: usize,
    },

    /// Path normalization failed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Glob exclusion could not be compiled.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Snapshot file exists but is not a valid snapshot.
    #[error("Invalid snapshot file {path}: {message}")]
    InvalidSnapshot {
        /// Snapshot file path.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// Snapshot file was written by an unknown format version.
    #[error("Snapshot {path} has format version {found}, expected {expected}")]
    UnsupportedSnapshotVersion {
        /// Snapshot file path.
        path: String,
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Run configuration is inconsistent.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl FileSystemError {
    /// Build an IoError for a path.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `source` - The underlying IO error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Build an InvalidConfig error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the underlying cause is a permission problem.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            FileSystemError::IoError { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied
        )
    }
}

/// Which side of a comparison an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The baseline description.
    Original,
    /// The newer description.
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Original => f.write_str("original"),
            Side::Candidate => f.write_str("candidate"),
        }
    }
}

/// Misuse of the comparison API.
///
/// These indicate a programming error rather than a runtime condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComparisonError {
    /// One side of the comparison was not supplied.
    #[error("The file description given as {side} is missing")]
    MissingDescription {
        /// Which side was missing.
        side: Side,
    },

    /// The two descriptions refer to different paths.
    #[error("The files given as original ({original}) and candidate ({candidate}) do not have the same path")]
    PathMismatch {
        /// Path of the original description.
        original: String,
        /// Path of the candidate description.
        candidate: String,
    },
}

/// Failure reported by a report generator.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report could not be written.
    #[error("Failed to write report {path}: {source}")]
    Write {
        /// Destination path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other generator-specific failure.
    #[error("{message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}
