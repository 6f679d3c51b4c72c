//! Path normalization utilities for snapshot keys and output files.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Convert a path to absolute without resolving symlinks.
///
/// # Arguments
/// * `path` - Path to convert (relative or absolute)
///
/// # Returns
/// Absolute path, joining with current directory if relative.
///
/// # Errors
/// Returns error if current directory cannot be determined.
pub fn to_absolute(path: &Path) -> Result<PathBuf, PathError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        std::env::current_dir()
            .map(|cwd: PathBuf| cwd.join(path))
            .map_err(|e: std::io::Error| PathError::from_io(path.display().to_string(), e))
    }
}

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically.
/// Does not access the filesystem or resolve symlinks.
///
/// # Arguments
/// * `path` - Path to normalize
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Append `.{extension}` to a path unless it already ends with it.
///
/// The comparison is case-insensitive, so `Report.HTML` is left alone.
///
/// # Arguments
/// * `path` - Path to check
/// * `extension` - Extension without the leading dot
pub fn with_required_extension(path: &Path, extension: &str) -> PathBuf {
    let has_extension: bool = path
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false);

    if has_extension {
        return path.to_path_buf();
    }

    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

/// String key used for a path in snapshots and exclusion checks.
///
/// Non-UTF-8 sequences are replaced lossily.
///
/// # Errors
/// Returns error if the path is empty.
pub fn path_key(path: &Path) -> Result<String, PathError> {
    let key: String = path.to_string_lossy().into_owned();
    if key.is_empty() {
        return Err(PathError::InvalidPath { path: key });
    }
    Ok(key)
}
