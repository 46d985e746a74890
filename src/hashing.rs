//! SHA-256 helpers for deriving stable identifiers

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of string content
///
/// Returns a hex-encoded SHA-256 hash (64 characters)
pub fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Hash the parts joined with `:` and keep the first `len` hex characters.
pub fn short_hash(parts: &[&str], len: usize) -> String {
    let mut hash = compute_sha256(&parts.join(":"));
    hash.truncate(len.min(64));
    hash
}
