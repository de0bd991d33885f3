//! Mnemonic-based account recovery.
//!
//! At initialization the private key is encrypted a second time under a
//! key derived from a 24-word BIP39 phrase, and stored alongside the
//! password-wrapped copy. Recovery decrypts that copy and re-wraps the
//! key under a new password. The recovery record itself is never
//! rewritten after setup - the private key it protects never changes,
//! so the kit printed at initialization stays valid for the lifetime of
//! the account, across any number of password changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task;
use tracing::{info, warn};

use mariner_crypto::{decrypt, mnemonic, CryptoError, EncryptedData, WrappingKeyPair};

use crate::{
    KeyError, KeyManager, KeyResult, FORMAT_VERSION, KEY_PRIVATE_RECOVERY, META_INITIALIZED,
    META_VERSION,
};

/// One-time recovery material returned by [`KeyManager::initialize`].
///
/// Intended to be rendered for the user to print or store offline and
/// then dropped. The mnemonic alone is sufficient to recover; the salt
/// and public key let a user verify a kit against an account without
/// unlocking it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryKit {
    /// 24-word BIP39 phrase. The only secret in the kit.
    pub mnemonic: String,
    /// Base64 of the Argon2id salt in effect at initialization.
    pub salt: String,
    /// Base64 SPKI DER of the account's public key.
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

impl KeyManager {
    /// Whether a recovery record exists for this account. Accounts
    /// initialized by older builds may lack one.
    pub async fn has_recovery(&self) -> KeyResult<bool> {
        Ok(self.secrets.get(KEY_PRIVATE_RECOVERY).await?.is_some())
    }

    /// Recovers the account with the 24-word phrase and sets a new
    /// password, then opens an unlocked session.
    ///
    /// The previous password stops working (its salt and blob are
    /// replaced); documents remain readable because the underlying key
    /// pair is unchanged.
    pub async fn recover_with_phrase(&self, phrase: &str, new_password: &str) -> KeyResult<()> {
        let _guard = self.lifecycle.lock().await;

        let violations = mariner_crypto::validate_password_strength(new_password);
        if !violations.is_empty() {
            return Err(KeyError::WeakPassword(violations));
        }
        // Checksum/word-count problems are user typos; report them
        // before touching the store or burning KDF time.
        if let Err(e) = mnemonic::validate_mnemonic(phrase) {
            warn!(error = %e, "recovery phrase rejected");
            return Err(KeyError::InvalidRecoveryPhrase);
        }

        // The gate is the recovery record itself, not the metadata flag:
        // a damaged metadata store must not block an account whose key
        // material is still intact.
        let Some(blob_bytes) = self.secrets.get(KEY_PRIVATE_RECOVERY).await? else {
            return Err(KeyError::NotInitialized);
        };
        let Ok(blob) = serde_json::from_slice::<EncryptedData>(&blob_bytes) else {
            return Err(KeyError::RecoveryKeyMismatch);
        };

        let phrase = phrase.to_string();
        let recovery_key = task::spawn_blocking(move || mnemonic::mnemonic_to_key(&phrase))
            .await
            .map_err(|e| KeyError::Internal(format!("recovery kdf task failed: {e}")))?
            .map_err(|e| match e {
                CryptoError::InvalidMnemonic(_) => KeyError::InvalidRecoveryPhrase,
                other => KeyError::Crypto(other),
            })?;

        // A valid phrase that fails here belongs to some other account
        // (or the record is damaged) - either way, not this kit.
        let Ok(private_der) = decrypt(&recovery_key, &blob) else {
            warn!("recovery phrase did not decrypt stored key material");
            return Err(KeyError::RecoveryKeyMismatch);
        };
        let keypair = WrappingKeyPair::from_private_der(&private_der)
            .map_err(|_| KeyError::RecoveryKeyMismatch)?;

        self.rewrap_under_new_password(&keypair, new_password).await?;
        // Recovery may be repairing a wiped metadata store; re-assert
        // the flags so the account unlocks normally afterward.
        self.metadata.put(META_VERSION, FORMAT_VERSION).await?;
        self.metadata.put(META_INITIALIZED, b"true").await?;
        self.open_session(keypair);
        info!("account recovered via mnemonic");
        Ok(())
    }
}
