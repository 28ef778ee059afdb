//! SHA-256 digest helpers
//!
//! Anonymization placeholders are built from a truncated hex digest, and
//! artifact metadata records the digest of the written payload.

use sha2::{Digest, Sha256};

/// Number of hex characters kept for a compact fingerprint
pub const FINGERPRINT_LEN: usize = 16;

/// Full lowercase hex SHA-256 digest
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(input.as_ref()))
}

/// Digest of the concatenated parts, truncated to [`FINGERPRINT_LEN`] hex chars
///
/// Parts are fed to the hasher in order with no separator, so
/// `fingerprint(&["ab", "c"]) == fingerprint(&["a", "bc"])`.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
