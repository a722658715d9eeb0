//! Digest Helpers
//!
//! Domain-separated SHA-256 hashing used for state checksums and seed
//! commitments. All digests are hex encoded so they can travel through
//! logs and JSON untouched.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest (64 lowercase hex characters).
pub type ChecksumHex = String;

/// Domain separator for session state checksums.
pub const STATE_DOMAIN: &[u8] = b"PLAYFAIR_STATE_V1";

/// Compute a plain SHA-256 hex digest of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> ChecksumHex {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute a SHA-256 hex digest with a domain separator prefix.
///
/// Distinct domains guarantee that a checksum computed for one purpose
/// can never collide with a commitment computed for another.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> ChecksumHex {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checksum of canonically serialized session state.
pub fn state_checksum(canonical: &str) -> ChecksumHex {
    hash_with_domain(STATE_DOMAIN, canonical.as_bytes())
}
