//! Shared types and utilities for changescan.
//!
//! This crate provides common functionality used by the scanning engine and the CLI:
//! - Content checksums (XXH3-128)
//! - Progress listener trait and listener registry
//! - Path normalization and extension helpers
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod hash;
pub mod path_utils;
pub mod progress;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PathError;
pub use hash::{checksum_bytes, checksum_file, Checksum, ChecksumHasher};
pub use path_utils::{lexical_normalize, path_key, to_absolute, with_required_extension};
pub use progress::{progress_fn, FnProgress, ProgressListener, ProgressListeners};
