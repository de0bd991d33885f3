//! RSA-4096 key wrapping with OAEP (SHA-256).
//!
//! The pair exists solely to transport 32-byte symmetric keys; it is
//! never used for signing, so a leaked wrapped key cannot be parlayed
//! into a forgery oracle.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::{SymmetricKey, KEY_SIZE};

/// RSA modulus size in bits.
pub const RSA_MODULUS_BITS: usize = 4096;

/// Long-lived asymmetric wrapping key pair.
///
/// The public key protects nothing by itself and is stored in the clear;
/// the private key is only persisted encrypted under the master key.
#[derive(Clone)]
pub struct WrappingKeyPair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl WrappingKeyPair {
    /// Generates a fresh RSA-4096 pair. Expensive - call once per user at
    /// initialization, off the async executor.
    pub fn generate() -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .map_err(|e| CryptoError::KeyDerivation(format!("RSA keygen failed: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Reconstructs the pair from a PKCS#8 DER private key.
    pub fn from_private_der(der: &[u8]) -> CryptoResult<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Serializes the private key as PKCS#8 DER. The buffer zeroizes on
    /// drop; encrypt it before it touches any store.
    pub fn private_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let doc = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Serializes the public key as SPKI DER.
    pub fn public_der(&self) -> CryptoResult<Vec<u8>> {
        let doc = self
            .public
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        Ok(doc.into_vec())
    }

    /// Parses a standalone SPKI DER public key.
    pub fn public_from_der(der: &[u8]) -> CryptoResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }
}

/// Wraps a symmetric key under an RSA public key with OAEP-SHA-256.
pub fn wrap_key(key: &SymmetricKey, public: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    public
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))
}

/// Unwraps a symmetric key with the RSA private key. Fails with
/// [`CryptoError::KeyUnwrap`] when the private key does not correspond to
/// the wrapping public key or the wrapped blob was tampered with.
pub fn unwrap_key(wrapped: &[u8], private: &RsaPrivateKey) -> CryptoResult<SymmetricKey> {
    let plaintext = Zeroizing::new(
        private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| CryptoError::KeyUnwrap)?,
    );

    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::KeyUnwrap);
    }
    SymmetricKey::from_slice(&plaintext)
}
