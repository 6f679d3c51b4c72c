//! Shared constants used across changescan crates.

/// Extension appended to snapshot files that do not already carry it.
pub const SNAPSHOT_EXTENSION: &str = "fsc";

/// Extension appended to HTML report files that do not already carry it.
pub const REPORT_EXTENSION: &str = "html";

/// Read buffer used when checksumming file contents (64KB).
pub const CHECKSUM_BUFFER_SIZE: usize = 64 * 1024;

/// Windows MAX_PATH limit.
pub const WINDOWS_MAX_PATH: usize = 260;

/// Longest path accepted on platforms other than Windows (Linux PATH_MAX).
pub const UNIX_MAX_PATH: usize = 4096;

/// Path length limit for the current platform.
#[cfg(windows)]
pub const MAX_PATH_LENGTH: usize = WINDOWS_MAX_PATH;

/// Path length limit for the current platform.
#[cfg(not(windows))]
pub const MAX_PATH_LENGTH: usize = UNIX_MAX_PATH;
