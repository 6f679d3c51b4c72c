//! Content checksums.
//!
//! File contents are reduced to a single XXH3-128 value. The value is
//! computed once when a file is described and is authoritative for every
//! later comparison, so nothing here is ever recomputed during a diff.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xxhash_rust::xxh3::Xxh3;

use crate::constants::CHECKSUM_BUFFER_SIZE;

/// XXH3-128 digest of a file's contents.
///
/// Serialized as a 32-character lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(u128);

impl Checksum {
    /// Digest as a 32-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Error returned when a checksum string is not 32 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid checksum '{value}': expected 32 hex digits")]
pub struct ParseChecksumError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for Checksum {
    type Err = ParseChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(ParseChecksumError {
                value: s.to_string(),
            });
        }
        u128::from_str_radix(s, 16)
            .map(Checksum)
            .map_err(|_| ParseChecksumError {
                value: s.to_string(),
            })
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text: String = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the checksum of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
pub fn checksum_bytes(data: &[u8]) -> Checksum {
    Checksum(xxhash_rust::xxh3::xxh3_128(data))
}

/// Compute the checksum of a file, streaming its contents.
///
/// # Arguments
/// * `path` - Path to the file to hash
///
/// # Returns
/// The checksum together with the number of bytes read.
///
/// # Errors
/// Returns error if file cannot be opened or read.
pub fn checksum_file(path: &Path) -> Result<(Checksum, u64), std::io::Error> {
    let mut file: std::fs::File = std::fs::File::open(path)?;
    let mut hasher: ChecksumHasher = ChecksumHasher::new();
    let mut buffer: Vec<u8> = vec![0u8; CHECKSUM_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let bytes_read: usize = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    Ok((hasher.finish(), total))
}

/// Streaming hasher producing a [`Checksum`].
pub struct ChecksumHasher {
    inner: Xxh3,
}

impl ChecksumHasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Digest of everything fed so far.
    pub fn finish(&self) -> Checksum {
        Checksum(self.inner.digest128())
    }
}

impl Default for ChecksumHasher {
    fn default() -> Self {
        Self::new()
    }
}
