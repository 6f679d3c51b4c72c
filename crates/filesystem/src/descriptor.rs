//! Immutable metadata record for a single file.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use changescan_common::{checksum_file, path_key, Checksum, MAX_PATH_LENGTH};
use serde::{Deserialize, Serialize};

use crate::error::FileSystemError;

/// Metadata captured for one file at scan time.
///
/// Timestamps are microseconds since the Unix epoch. The checksum is
/// computed once here and is authoritative for every later comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    fully_qualified_path: String,
    checksum: Checksum,
    size: u64,
    /// `None` where the platform or filesystem does not record birth time.
    creation_time_us: Option<i64>,
    last_access_time_us: i64,
    last_write_time_us: i64,
}

impl FileDescriptor {
    /// Describe the file at `path`, reading its metadata and hashing its content.
    ///
    /// # Arguments
    /// * `path` - File to describe; used verbatim as the descriptor's key
    ///
    /// # Errors
    /// Fails if the path is too long, is not a regular file, vanished, or
    /// cannot be read. No partial descriptor is ever produced.
    pub fn describe(path: &Path) -> Result<Self, FileSystemError> {
        let key: String = path_key(path)?;
        if key.len() > MAX_PATH_LENGTH {
            return Err(FileSystemError::PathTooLong {
                length: key.len(),
                limit: MAX_PATH_LENGTH,
                path: key,
            });
        }

        let metadata: std::fs::Metadata =
            std::fs::metadata(path).map_err(|e| FileSystemError::io(key.clone(), e))?;
        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile { path: key });
        }

        let creation_time_us: Option<i64> = match metadata.created() {
            Ok(time) => Some(to_epoch_micros(time)),
            Err(e) if e.kind() == std::io::ErrorKind::Unsupported => None,
            Err(e) => return Err(FileSystemError::io(key, e)),
        };
        let last_access_time_us: i64 = metadata
            .accessed()
            .map(to_epoch_micros)
            .map_err(|e| FileSystemError::io(key.clone(), e))?;
        let last_write_time_us: i64 = metadata
            .modified()
            .map(to_epoch_micros)
            .map_err(|e| FileSystemError::io(key.clone(), e))?;

        // Size comes from the hashing pass so it always agrees with the checksum.
        let (checksum, bytes_read): (Checksum, u64) =
            checksum_file(path).map_err(|e| FileSystemError::io(key.clone(), e))?;
        if bytes_read != metadata.len() {
            log::debug!(
                "{} changed while being described: {} bytes listed, {} hashed",
                key,
                metadata.len(),
                bytes_read
            );
        }

        Ok(Self {
            fully_qualified_path: key,
            checksum,
            size: bytes_read,
            creation_time_us,
            last_access_time_us,
            last_write_time_us,
        })
    }

    /// Assemble a descriptor from already-known values.
    ///
    /// # Arguments
    /// * `path` - Fully qualified path
    /// * `checksum` - Content checksum
    /// * `size` - Size in bytes
    /// * `creation_time_us` - Birth time, if known
    /// * `last_access_time_us` - Last access time
    /// * `last_write_time_us` - Last modification time
    pub fn from_parts(
        path: impl Into<String>,
        checksum: Checksum,
        size: u64,
        creation_time_us: Option<i64>,
        last_access_time_us: i64,
        last_write_time_us: i64,
    ) -> Self {
        Self {
            fully_qualified_path: path.into(),
            checksum,
            size,
            creation_time_us,
            last_access_time_us,
            last_write_time_us,
        }
    }

    /// Fully qualified path; the snapshot key.
    pub fn fully_qualified_path(&self) -> &str {
        &self.fully_qualified_path
    }

    /// Content checksum.
    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Birth time in microseconds since the epoch.
    pub fn creation_time_us(&self) -> Option<i64> {
        self.creation_time_us
    }

    /// Last access time in microseconds since the epoch.
    pub fn last_access_time_us(&self) -> i64 {
        self.last_access_time_us
    }

    /// Last write time in microseconds since the epoch.
    pub fn last_write_time_us(&self) -> i64 {
        self.last_write_time_us
    }
}

/// Convert a `SystemTime` to signed microseconds since the Unix epoch.
pub(crate) fn to_epoch_micros(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_micros() as i64,
        Err(before) => -(before.duration().as_micros() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changescan_common::checksum_bytes;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_describe_regular_file() {
        let dir: TempDir = TempDir::new().unwrap();
        let path: std::path::PathBuf = dir.path().join("data.bin");
        let mut file: std::fs::File = std::fs::File::create(&path).unwrap();
        file.write_all(b"payload").unwrap();
        drop(file);

        let descriptor: FileDescriptor = FileDescriptor::describe(&path).unwrap();

        assert_eq!(descriptor.fully_qualified_path(), path.to_string_lossy());
        assert_eq!(descriptor.size(), 7);
        assert_eq!(descriptor.checksum(), checksum_bytes(b"payload"));
        assert!(descriptor.last_write_time_us() > 0);
    }

    #[test]
    fn test_describe_missing_file_fails() {
        let dir: TempDir = TempDir::new().unwrap();
        let result = FileDescriptor::describe(&dir.path().join("gone.txt"));
        assert!(matches!(result, Err(FileSystemError::IoError { .. })));
    }

    #[test]
    fn test_describe_directory_fails() {
        let dir: TempDir = TempDir::new().unwrap();
        let result = FileDescriptor::describe(dir.path());
        assert!(matches!(result, Err(FileSystemError::NotAFile { .. })));
    }

    #[test]
    fn test_describe_overlong_path_fails() {
        let long_name: String = "x".repeat(MAX_PATH_LENGTH + 1);
        let result = FileDescriptor::describe(Path::new(&long_name));
        assert!(matches!(result, Err(FileSystemError::PathTooLong { .. })));
    }

    #[test]
    fn test_epoch_micros_before_epoch() {
        let before: SystemTime = UNIX_EPOCH - std::time::Duration::from_micros(5);
        assert_eq!(to_epoch_micros(before), -5);
        assert_eq!(to_epoch_micros(UNIX_EPOCH), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_size_is_the_hashed_length() {
        // procfs lists its files as empty but they read back with content.
        let path: &Path = Path::new("/proc/self/status");
        if !path.is_file() {
            return;
        }

        let descriptor: FileDescriptor = FileDescriptor::describe(path).unwrap();

        assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
        assert!(descriptor.size() > 0);
    }
}
