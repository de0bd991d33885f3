//! The self-contained encrypted document record.
//!
//! A bundle plus the recipient's private key is everything needed to
//! recover the document; no external parameters are consulted. Binary
//! fields travel as base64 so the bundle serializes to one JSON object
//! that generic blob stores can hold without interpreting.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mariner_crypto::{DetachedCiphertext, NONCE_SIZE, TAG_SIZE};

use crate::DocumentError;

/// Current bundle format version.
pub const BUNDLE_VERSION: &str = "1.0";

/// Non-secret facts about the plaintext, stored alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// Hex SHA-256 of the plaintext, re-checked after decryption.
    pub hash: String,
    pub original_size: u64,
    pub mime_type: String,
    pub timestamp: DateTime<Utc>,
}

/// One encrypted document: ciphertext, the wrapped per-document key,
/// AEAD nonce and tag, and a metadata block. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedDocumentBundle {
    pub version: String,
    pub ciphertext: String,
    pub wrapped_key: String,
    pub nonce: String,
    pub tag: String,
    pub metadata: BundleMetadata,
}

impl EncryptedDocumentBundle {
    pub(crate) fn assemble(
        sealed: &DetachedCiphertext,
        wrapped_key: &[u8],
        metadata: BundleMetadata,
    ) -> Self {
        Self {
            version: BUNDLE_VERSION.to_string(),
            ciphertext: BASE64.encode(&sealed.ciphertext),
            wrapped_key: BASE64.encode(wrapped_key),
            nonce: BASE64.encode(sealed.nonce),
            tag: BASE64.encode(sealed.tag),
            metadata,
        }
    }

    /// Decodes the binary fields. Structural problems (bad base64,
    /// wrong nonce/tag length) are [`DocumentError::InvalidBundle`];
    /// they are detectable before any key material is touched.
    pub(crate) fn sealed(&self) -> Result<(DetachedCiphertext, Vec<u8>), DocumentError> {
        let ciphertext = decode_field(&self.ciphertext, "ciphertext")?;
        let wrapped_key = decode_field(&self.wrapped_key, "wrappedKey")?;
        let nonce = decode_field(&self.nonce, "nonce")?;
        let tag = decode_field(&self.tag, "tag")?;

        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|v: Vec<u8>| {
            DocumentError::InvalidBundle(format!("nonce is {} bytes, want {NONCE_SIZE}", v.len()))
        })?;
        let tag: [u8; TAG_SIZE] = tag.try_into().map_err(|v: Vec<u8>| {
            DocumentError::InvalidBundle(format!("tag is {} bytes, want {TAG_SIZE}", v.len()))
        })?;

        Ok((
            DetachedCiphertext {
                nonce,
                ciphertext,
                tag,
            },
            wrapped_key,
        ))
    }

    /// Encodes the bundle as one opaque JSON blob for byte-stream
    /// storage APIs.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        serde_json::to_vec(self).map_err(|e| DocumentError::Internal(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        serde_json::from_slice(bytes).map_err(|e| DocumentError::InvalidBundle(e.to_string()))
    }

    /// Whether a stored blob looks like an encrypted bundle, for callers
    /// that hold a mix of encrypted and plain objects.
    pub fn is_bundle(bytes: &[u8]) -> bool {
        Self::from_bytes(bytes).is_ok()
    }
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, DocumentError> {
    BASE64
        .decode(value)
        .map_err(|e| DocumentError::InvalidBundle(format!("{field}: {e}")))
}
