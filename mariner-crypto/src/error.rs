use thiserror::Error;

/// Errors from the primitive layer.
///
/// Decryption and unwrap failures carry no detail about *which* check
/// failed beyond the variant itself - a wrong key and tampered data are
/// indistinguishable by design.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed (wrong key or tampered data)")]
    Decryption,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("key wrap failed: {0}")]
    KeyWrap(String),

    #[error("key unwrap failed (private key does not match wrapping key)")]
    KeyUnwrap,

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    #[error("invalid recovery phrase: {0}")]
    InvalidMnemonic(String),

    #[error("key encoding failed: {0}")]
    KeyEncoding(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
