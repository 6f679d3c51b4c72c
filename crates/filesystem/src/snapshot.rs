//! Point-in-time mapping of file paths to descriptors, with persistence.
//!
//! Snapshots are stored as a self-describing JSON document:
//!
//! ```json
//! {
//!   "format": "changescan-snapshot",
//!   "version": 1,
//!   "root": "/srv/www",
//!   "capturedAtUs": 1760000000000000,
//!   "files": [ { "fullyQualifiedPath": "/srv/www/index.html", ... } ]
//! }
//! ```
//!
//! Files are written sorted by path so the same tree always serializes to
//! the same bytes.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use changescan_common::{with_required_extension, SNAPSHOT_EXTENSION};
use serde::{Deserialize, Serialize};

use crate::descriptor::{to_epoch_micros, FileDescriptor};
use crate::error::FileSystemError;

/// Format tag written into every snapshot file.
pub const SNAPSHOT_FORMAT: &str = "changescan-snapshot";

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocument {
    format: String,
    version: u32,
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    captured_at_us: Option<i64>,
    files: Vec<FileDescriptor>,
}

/// Mapping of fully qualified path to [`FileDescriptor`].
///
/// Holds at most one descriptor per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSystemSnapshot {
    files: HashMap<String, FileDescriptor>,
    root: Option<String>,
    captured_at_us: Option<i64>,
}

impl FileSystemSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty snapshot for a scan of `root`, stamped with the current time.
    pub fn for_root(root: impl Into<String>) -> Self {
        Self {
            files: HashMap::new(),
            root: Some(root.into()),
            captured_at_us: Some(to_epoch_micros(SystemTime::now())),
        }
    }

    /// Insert a descriptor, replacing any existing one for the same path.
    ///
    /// # Returns
    /// The replaced descriptor, if any.
    pub fn add(&mut self, descriptor: FileDescriptor) -> Option<FileDescriptor> {
        let key: String = descriptor.fully_qualified_path().to_string();
        self.files.insert(key, descriptor)
    }

    /// Look up a descriptor by path.
    pub fn get(&self, path: &str) -> Option<&FileDescriptor> {
        self.files.get(path)
    }

    /// Remove and return the descriptor for `path`, marking it consumed.
    pub fn lookup_and_remove(&mut self, path: &str) -> Option<FileDescriptor> {
        self.files.remove(path)
    }

    /// Whether a descriptor exists for `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Root directory the snapshot was taken from, if recorded.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Capture time in microseconds since the epoch, if recorded.
    pub fn captured_at_us(&self) -> Option<i64> {
        self.captured_at_us
    }

    /// All paths, sorted.
    pub fn sorted_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Total size in bytes of all described files.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|d: &FileDescriptor| d.size()).sum()
    }

    /// Location a snapshot saved to `path` actually lands at.
    ///
    /// Appends the `.fsc` extension when missing.
    pub fn resolved_path(path: &Path) -> PathBuf {
        with_required_extension(path, SNAPSHOT_EXTENSION)
    }

    /// Persist the whole snapshot.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the destination, so a failed save never leaves a truncated snapshot.
    ///
    /// # Arguments
    /// * `path` - Destination; `.fsc` is appended when missing
    ///
    /// # Returns
    /// The path actually written.
    ///
    /// # Errors
    /// Returns error if the file cannot be created, written, or renamed.
    pub fn save(&self, path: &Path) -> Result<PathBuf, FileSystemError> {
        let destination: PathBuf = Self::resolved_path(path);
        let display: String = destination.display().to_string();
        let staging: PathBuf = with_required_extension(&destination, "partial");

        let mut files: Vec<&FileDescriptor> = self.files.values().collect();
        files.sort_unstable_by(|a, b| a.fully_qualified_path().cmp(b.fully_qualified_path()));

        let document: SnapshotDocumentRef<'_> = SnapshotDocumentRef {
            format: SNAPSHOT_FORMAT,
            version: SNAPSHOT_FORMAT_VERSION,
            root: self.root.as_deref(),
            captured_at_us: self.captured_at_us,
            files,
        };

        let file: std::fs::File = std::fs::File::create(&staging)
            .map_err(|e| FileSystemError::io(staging.display().to_string(), e))?;
        let mut writer: BufWriter<std::fs::File> = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &document).map_err(|e| {
            FileSystemError::io(display.clone(), std::io::Error::other(e))
        })?;
        writer
            .flush()
            .map_err(|e| FileSystemError::io(display.clone(), e))?;
        drop(writer);

        std::fs::rename(&staging, &destination).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            FileSystemError::io(display.clone(), e)
        })?;

        log::debug!("Wrote {} descriptors to {}", self.files.len(), display);
        Ok(destination)
    }

    /// Load a snapshot previously written by [`save`](Self::save).
    ///
    /// # Arguments
    /// * `path` - Snapshot file; `.fsc` is appended when missing
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable, not a snapshot,
    /// or written by an unsupported format version.
    pub fn load(path: &Path) -> Result<Self, FileSystemError> {
        let source: PathBuf = Self::resolved_path(path);
        let display: String = source.display().to_string();

        let file: std::fs::File =
            std::fs::File::open(&source).map_err(|e| FileSystemError::io(display.clone(), e))?;
        let document: SnapshotDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| {
                if e.is_io() {
                    FileSystemError::io(display.clone(), std::io::Error::other(e))
                } else {
                    FileSystemError::InvalidSnapshot {
                        path: display.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        if document.format != SNAPSHOT_FORMAT {
            return Err(FileSystemError::InvalidSnapshot {
                path: display,
                message: format!("unexpected format tag '{}'", document.format),
            });
        }
        if document.version != SNAPSHOT_FORMAT_VERSION {
            return Err(FileSystemError::UnsupportedSnapshotVersion {
                path: display,
                found: document.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let mut snapshot: FileSystemSnapshot = FileSystemSnapshot {
            files: HashMap::with_capacity(document.files.len()),
            root: document.root,
            captured_at_us: document.captured_at_us,
        };
        for descriptor in document.files {
            snapshot.add(descriptor);
        }

        log::debug!("Read {} descriptors from {}", snapshot.len(), display);
        Ok(snapshot)
    }
}

impl IntoIterator for FileSystemSnapshot {
    type Item = FileDescriptor;
    type IntoIter = std::collections::hash_map::IntoValues<String, FileDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_values()
    }
}

impl FromIterator<FileDescriptor> for FileSystemSnapshot {
    fn from_iter<I: IntoIterator<Item = FileDescriptor>>(iter: I) -> Self {
        let mut snapshot: FileSystemSnapshot = FileSystemSnapshot::new();
        for descriptor in iter {
            snapshot.add(descriptor);
        }
        snapshot
    }
}

/// Borrowing twin of [`SnapshotDocument`] used when saving.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocumentRef<'a> {
    format: &'a str,
    version: u32,
    root: Option<&'a str>,
    captured_at_us: Option<i64>,
    files: Vec<&'a FileDescriptor>,
}
