//! Content integrity digests.

use sha2::{Digest, Sha256};

/// SHA-256 digest of `data`, hex-encoded. Used for document integrity
/// checks, never for password storage.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
