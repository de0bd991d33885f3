//! Authenticated symmetric encryption with AES-256-GCM.
//!
//! Nonces are always generated fresh inside this module; callers cannot
//! supply one. Reusing a nonce under the same key breaks GCM completely,
//! so the API simply never exposes that degree of freedom.

use aes_gcm::{
    aead::{Aead, AeadCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::SymmetricKey;

/// AES-GCM nonce size in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Ciphertext with its nonce. The GCM tag is appended to the ciphertext
/// (RustCrypto convention). Used for the encrypted private key blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext followed by the 16-byte authentication tag.
    pub ciphertext: Vec<u8>,
}

/// Ciphertext with nonce and detached tag. Used by the document bundle
/// format, which stores the tag as a separate field.
#[derive(Clone, Debug)]
pub struct DetachedCiphertext {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce.into(),
        ciphertext,
    })
}

/// Decrypts an [`EncryptedData`] blob. Fails closed: any tag mismatch or
/// truncation yields [`CryptoError::Decryption`] and no plaintext.
pub fn decrypt(key: &SymmetricKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&data.nonce);

    cipher
        .decrypt(nonce, data.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypts with a detached authentication tag.
pub fn encrypt_detached(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<DetachedCiphertext> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(DetachedCiphertext {
        nonce: nonce.into(),
        ciphertext: buffer,
        tag: tag.into(),
    })
}

/// Decrypts a detached-tag ciphertext. Fails closed on tag mismatch.
pub fn decrypt_detached(key: &SymmetricKey, data: &DetachedCiphertext) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&data.nonce);
    let tag = Tag::from_slice(&data.tag);

    let mut buffer = data.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
        .map_err(|_| CryptoError::Decryption)?;

    Ok(buffer)
}
