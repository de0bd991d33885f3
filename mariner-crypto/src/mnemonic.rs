//! Recovery phrase generation and key derivation.
//!
//! A 24-word BIP39 mnemonic (256 bits of entropy) is generated once at
//! initialization, shown once, and never stored. The key derived from it
//! shares no intermediate value with the password path: the password path
//! uses a random per-user salt, the mnemonic path a fixed domain salt.

use bip39::Mnemonic;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, KdfParams, Salt, SALT_SIZE};
use crate::SymmetricKey;

/// Recovery mnemonics are always 24 words.
pub const MNEMONIC_WORD_COUNT: usize = 24;

const MNEMONIC_ENTROPY_BYTES: usize = 32;

// Fixed domain salt, safe because the mnemonic itself carries 256 bits
// of entropy.
const MNEMONIC_DOMAIN_SALT: &[u8; SALT_SIZE] = b"mariner-recovery";

/// Generates a fresh 24-word recovery mnemonic.
pub fn generate_recovery_mnemonic() -> CryptoResult<String> {
    let mut entropy = [0u8; MNEMONIC_ENTROPY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| CryptoError::KeyDerivation(format!("mnemonic generation failed: {e}")))?;

    Ok(mnemonic.to_string())
}

/// Validates the phrase's BIP39 checksum and word count.
pub fn validate_mnemonic(phrase: &str) -> CryptoResult<()> {
    let mnemonic: Mnemonic = phrase
        .parse()
        .map_err(|e| CryptoError::InvalidMnemonic(format!("{e}")))?;

    if mnemonic.word_count() != MNEMONIC_WORD_COUNT {
        return Err(CryptoError::InvalidMnemonic(format!(
            "expected {MNEMONIC_WORD_COUNT} words, got {}",
            mnemonic.word_count()
        )));
    }
    Ok(())
}

/// Derives the alternate 256-bit master key from a recovery mnemonic.
///
/// Checksum-validates first, then runs Argon2id over the normalized
/// phrase with a fixed domain salt. Deterministic: the same phrase always
/// reproduces the same key.
pub fn mnemonic_to_key(phrase: &str) -> CryptoResult<SymmetricKey> {
    let mnemonic: Mnemonic = phrase
        .parse()
        .map_err(|e| CryptoError::InvalidMnemonic(format!("{e}")))?;

    if mnemonic.word_count() != MNEMONIC_WORD_COUNT {
        return Err(CryptoError::InvalidMnemonic(format!(
            "expected {MNEMONIC_WORD_COUNT} words, got {}",
            mnemonic.word_count()
        )));
    }

    // Normalized spelling, independent of the caller's whitespace.
    let normalized = mnemonic.to_string();
    let salt = Salt::from_bytes(*MNEMONIC_DOMAIN_SALT);
    derive_key(&normalized, &salt, &KdfParams::default())
}
