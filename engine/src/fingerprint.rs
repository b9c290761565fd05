//! Content hashing and change-detection fingerprints.
//!
//! The fingerprint is the cheap `size:mtime` pair used to decide whether a
//! file changed between scans; the SHA-256 hash is the content identity. When
//! a manifest entry's fingerprint matches the on-disk metadata, the stored
//! hash is trusted and the file is not re-read.

use sha2::{Digest, Sha256};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// Sentinel hash for zero-length content.
pub const EMPTY_HASH: &str = "empty";

/// SHA-256 hex digest of raw bytes. Empty input yields the `"empty"` sentinel.
pub fn content_hash(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return EMPTY_HASH.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a path string, used to derive filesystem-safe cache
/// file names.
pub fn path_hash(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

/// The `size:mtime` change-detection fingerprint.
pub fn fingerprint(size: u64, mtime: i64) -> String {
    format!("{size}:{mtime}")
}

/// Modification time in whole seconds since the Unix epoch (0 when the
/// platform cannot report one).
pub fn mtime_secs(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(content_hash(b"package main"), content_hash(b"package main"));
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[test]
    fn test_hash_is_hex64() {
        let h = content_hash(b"x");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_sentinel() {
        assert_eq!(content_hash(b""), "empty");
    }

    #[test]
    fn test_fingerprint_shape() {
        assert_eq!(fingerprint(120, 1700000000), "120:1700000000");
    }
}
