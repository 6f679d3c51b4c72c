//! Snapshot, scan, and compare engine for changescan.
//!
//! This crate detects changes to a directory tree between two points in time:
//! - `FileDescriptor` - Metadata and checksum of one file
//! - `ExclusionRule` / `ExclusionSet` - Paths pruned from a scan
//! - `FileSystemSnapshot` - Path-keyed descriptors with durable save/load
//! - `ScanConfiguration` - Options controlling a run
//! - `DirectoryScanner` - Recursive walker building a snapshot
//! - `compare()` - Classification of new, removed, and changed files
//! - `ChangeScanner` - Drives scan, save, compare, and report steps

pub mod compare;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod exclusion;
pub mod run;
pub mod scanner;
pub mod snapshot;

// Re-export main types
pub use compare::{compare, DifferenceKind, FileComparison, FileSystemComparison, MovedFile};
pub use config::ScanConfiguration;
pub use descriptor::FileDescriptor;
pub use error::{ComparisonError, FileSystemError, ReportError, Side};
pub use exclusion::{ExclusionCategory, ExclusionRule, ExclusionSet};
pub use run::{ChangeScanner, ReportGenerator, RunSummary, ADMIN_FAULT_WARNING};
pub use scanner::{DirectoryScanner, ScanOutcome, ScanStats};
pub use snapshot::{FileSystemSnapshot, SNAPSHOT_FORMAT, SNAPSHOT_FORMAT_VERSION};
