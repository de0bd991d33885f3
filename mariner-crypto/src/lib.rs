//! Cryptographic primitive layer for Mariner.
//!
//! Provides the stateless building blocks the key manager and document
//! encryption service are assembled from:
//! - Argon2id for deriving master keys from passwords and recovery phrases
//! - AES-256-GCM for authenticated symmetric encryption
//! - RSA-4096 with OAEP (SHA-256) for wrapping per-document keys
//! - SHA-256 digests for plaintext integrity checks
//! - BIP39 mnemonics (24 words) for the offline recovery path
//!
//! # Key hierarchy
//!
//! 1. **Master key**: derived from the user's password (or recovery
//!    mnemonic) with Argon2id. Never persisted - recomputed on every
//!    unlock.
//! 2. **Wrapping key pair**: a long-lived RSA-4096 pair. The private key
//!    is only ever stored encrypted under the current master key.
//! 3. **Document keys (DEKs)**: fresh random AES-256 keys, one per
//!    document, stored only in RSA-wrapped form.
//!
//! Everything here is a pure function over byte buffers and key handles;
//! session state and persistence live in `mariner-vault`.

mod cipher;
mod digest;
mod error;
mod kdf;
mod keypair;
pub mod mnemonic;
mod strength;

pub use cipher::{
    decrypt, decrypt_detached, encrypt, encrypt_detached, DetachedCiphertext, EncryptedData,
    NONCE_SIZE, TAG_SIZE,
};
pub use digest::sha256_hex;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, KdfParams, Salt, SALT_SIZE};
pub use keypair::{unwrap_key, wrap_key, WrappingKeyPair, RSA_MODULUS_BITS};
pub use mnemonic::{generate_recovery_mnemonic, mnemonic_to_key, MNEMONIC_WORD_COUNT};
pub use strength::{validate_password_strength, PasswordRule, MIN_PASSWORD_LENGTH};

// Key-handle types callers pass back into wrap/unwrap.
pub use rsa::{RsaPrivateKey, RsaPublicKey};

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key. Serves both as the password/mnemonic-derived
/// master key and as a per-document encryption key (DEK).
///
/// Zeroized on drop. Deliberately implements neither `Debug` nor serde.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(mut bytes: [u8; KEY_SIZE]) -> Self {
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self::from_bytes(key_bytes))
    }

    /// Generates a fresh random key (used for per-document DEKs).
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}
