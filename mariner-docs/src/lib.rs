//! Document encryption service.
//!
//! Envelope encryption over the key manager's session: each document is
//! encrypted under a fresh random AES-256 key (the DEK), and only the
//! RSA-wrapped DEK travels with the ciphertext. The service never holds
//! raw key material of its own - it asks the [`KeyManager`] for the
//! session keys on every call, so a locked session stops everything at
//! one enforcement point.

mod bundle;

pub use bundle::{BundleMetadata, EncryptedDocumentBundle, BUNDLE_VERSION};

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task;
use tracing::{debug, warn};

use mariner_crypto::{
    decrypt_detached, encrypt_detached, sha256_hex, unwrap_key, wrap_key, CryptoError, SymmetricKey,
};
use mariner_vault::KeyManager;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("session is locked")]
    Locked,

    /// The wrapped DEK would not open with the current private key.
    /// Typical cause: the bundle was encrypted for a different key pair.
    #[error("document key cannot be unwrapped with the current private key")]
    KeyUnwrapFailed,

    /// AEAD tag mismatch: the ciphertext, nonce or tag was altered.
    #[error("document failed authenticated decryption")]
    DecryptionFailed,

    /// Decryption succeeded but the recovered plaintext does not match
    /// the hash recorded at encryption time.
    #[error("document integrity hash mismatch")]
    CorruptedData,

    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// A decrypted document with the metadata recorded at encryption time.
/// Only constructed once both the AEAD tag and the integrity hash have
/// checked out, which is what `verified` attests.
pub struct DecryptedDocument {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub original_size: u64,
    pub verified: bool,
}

/// Encrypts and decrypts documents against an injected [`KeyManager`].
///
/// Calls may run concurrently once the session is unlocked; each call
/// generates its own DEK and nonce and touches only its own bundle.
pub struct DocumentCrypter {
    keys: Arc<KeyManager>,
}

impl DocumentCrypter {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Encrypts `data` into a self-contained bundle.
    ///
    /// The DEK exists only inside this call; the bundle carries it
    /// solely in RSA-wrapped form. Fails with [`DocumentError::Locked`]
    /// when no session is open.
    pub async fn encrypt(&self, data: &[u8], mime_type: &str) -> DocumentResult<EncryptedDocumentBundle> {
        let public = self.keys.public_key().map_err(|_| DocumentError::Locked)?;
        let data = data.to_vec();
        let mime_type = mime_type.to_string();

        let bundle = task::spawn_blocking(move || {
            let dek = SymmetricKey::generate();
            let sealed = encrypt_detached(&dek, &data)?;
            let wrapped = wrap_key(&dek, &public)?;

            let metadata = BundleMetadata {
                hash: sha256_hex(&data),
                original_size: data.len() as u64,
                mime_type,
                timestamp: Utc::now(),
            };
            Ok::<_, CryptoError>(EncryptedDocumentBundle::assemble(&sealed, &wrapped, metadata))
        })
        .await
        .map_err(|e| DocumentError::Internal(format!("encrypt task failed: {e}")))??;

        debug!(
            size = bundle.metadata.original_size,
            mime = %bundle.metadata.mime_type,
            "document encrypted"
        );
        Ok(bundle)
    }

    /// Decrypts a bundle and verifies it end to end: unwrap the DEK,
    /// check the AEAD tag, then re-hash the plaintext against the hash
    /// stored in the bundle. Plaintext is only returned when all three
    /// pass.
    pub async fn decrypt(&self, bundle: &EncryptedDocumentBundle) -> DocumentResult<DecryptedDocument> {
        let private = self.keys.private_key().map_err(|_| DocumentError::Locked)?;

        if bundle.version != BUNDLE_VERSION {
            warn!(version = %bundle.version, "bundle has unexpected format version");
        }

        let (sealed, wrapped) = bundle.sealed()?;
        let expected_hash = bundle.metadata.hash.clone();
        let mime_type = bundle.metadata.mime_type.clone();

        let data = task::spawn_blocking(move || {
            let dek = unwrap_key(&wrapped, &private).map_err(|_| DocumentError::KeyUnwrapFailed)?;
            let plaintext =
                decrypt_detached(&dek, &sealed).map_err(|_| DocumentError::DecryptionFailed)?;

            if sha256_hex(&plaintext) != expected_hash {
                return Err(DocumentError::CorruptedData);
            }
            Ok(plaintext)
        })
        .await
        .map_err(|e| DocumentError::Internal(format!("decrypt task failed: {e}")))??;

        Ok(DecryptedDocument {
            original_size: data.len() as u64,
            data,
            mime_type,
            verified: true,
        })
    }
}
