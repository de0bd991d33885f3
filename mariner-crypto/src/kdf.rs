//! Master key derivation with Argon2id.
//!
//! Identical (secret, salt, params) inputs always reproduce the same key;
//! the master key is recomputed on every unlock and never persisted.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::{SymmetricKey, KEY_SIZE};

/// Argon2id salt size in bytes (128 bits).
pub const SALT_SIZE: usize = 16;

/// Random per-password salt. Not secret - stored in plain metadata and
/// rotated whenever the password changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SALT_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SALT_SIZE,
                actual: bytes.len(),
            });
        }
        let mut salt_bytes = [0u8; SALT_SIZE];
        salt_bytes.copy_from_slice(bytes);
        Ok(Self(salt_bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
///
/// Defaults: 64 MiB memory, 3 passes, 4 lanes. Memory-hard enough that
/// offline guessing is bounded by RAM bandwidth, not hash throughput.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derives a 256-bit master key from a secret and salt with Argon2id.
pub fn derive_key(secret: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<SymmetricKey> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(secret.as_bytes(), salt.as_bytes(), output.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey::from_bytes(*output))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small params keep the test suite fast; production paths use
    // KdfParams::default().
    fn test_params() -> KdfParams {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::random();
        let k1 = derive_key("hunter2hunter2", &salt, &test_params()).unwrap();
        let k2 = derive_key("hunter2hunter2", &salt, &test_params()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_secret_changes_key() {
        let salt = Salt::random();
        let k1 = derive_key("password-one", &salt, &test_params()).unwrap();
        let k2 = derive_key("password-two", &salt, &test_params()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_salt_changes_key() {
        let k1 = derive_key("same-password", &Salt::random(), &test_params()).unwrap();
        let k2 = derive_key("same-password", &Salt::random(), &test_params()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn salt_from_slice_rejects_bad_length() {
        assert!(Salt::from_slice(&[0u8; 8]).is_err());
        assert!(Salt::from_slice(&[0u8; 16]).is_ok());
    }
}
