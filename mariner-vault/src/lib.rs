//! Key lifecycle manager.
//!
//! Owns the user's asymmetric wrapping key pair and walks it through the
//! lifecycle: initialize -> locked -> unlocked, with password change and
//! mnemonic recovery as the two ways of re-wrapping the same private key.
//!
//! Persistence is split across two injected [`KeyStore`] instances:
//!
//! - **secrets**: the master-key-encrypted private key blob, a second
//!   copy of the same private key encrypted under the recovery-phrase
//!   key, and the plaintext public key
//! - **metadata**: salt, format version and the initialized flag - all
//!   non-secret, so reading it leaks no cryptographic advantage
//!
//! "Unlocked" is the presence of a [`Session`] holding the decrypted key
//! pair; there is no boolean to forget to check. All lifecycle mutations
//! are serialized through an internal mutex - two racing password
//! changes against the same persisted blob would otherwise silently
//! invalidate one caller's key.

mod recovery;

pub use recovery::RecoveryKit;

use std::sync::{Arc, RwLock};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

use mariner_crypto::{
    decrypt, derive_key, encrypt, validate_password_strength, CryptoError, EncryptedData,
    KdfParams, PasswordRule, Salt, SymmetricKey, WrappingKeyPair,
};
use mariner_keystore::{KeyStore, StoreError};

pub use mariner_crypto::{RsaPrivateKey, RsaPublicKey};

// Secret store records
const KEY_PRIVATE: &str = "private_key";
pub(crate) const KEY_PRIVATE_RECOVERY: &str = "private_key_recovery";
const KEY_PUBLIC: &str = "public_key";

// Metadata store records
const META_SALT: &str = "salt";
const META_VERSION: &str = "format_version";
const META_INITIALIZED: &str = "initialized";

const FORMAT_VERSION: &[u8] = b"1";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("password does not meet strength policy")]
    WeakPassword(Vec<PasswordRule>),

    #[error("encryption already initialized")]
    AlreadyInitialized,

    #[error("encryption not initialized")]
    NotInitialized,

    #[error("session is locked")]
    Locked,

    #[error("wrong credentials")]
    WrongCredentials,

    #[error("invalid recovery phrase")]
    InvalidRecoveryPhrase,

    /// The phrase checksum validated but the recovery record would not
    /// decrypt. For a correctly generated recovery kit this is
    /// impossible - treat it as a data-integrity alarm, not user error.
    #[error("recovery phrase does not match stored key material")]
    RecoveryKeyMismatch,

    #[error("key store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type KeyResult<T> = Result<T, KeyError>;

/// An unlocked session: the decrypted wrapping key pair, alive only in
/// process memory. Dropping it is what "locked" means.
struct Session {
    keypair: WrappingKeyPair,
}

/// Orchestrates key generation, wrapping, persistence and the
/// locked/unlocked session.
///
/// Construct one per authenticated user context and inject it wherever
/// encryption is needed; there is deliberately no global instance.
pub struct KeyManager {
    secrets: Arc<dyn KeyStore>,
    metadata: Arc<dyn KeyStore>,
    kdf: KdfParams,
    session: RwLock<Option<Session>>,
    /// Serializes initialize/unlock/recover/change-password/lock.
    lifecycle: Mutex<()>,
}

impl KeyManager {
    pub fn new(secrets: Arc<dyn KeyStore>, metadata: Arc<dyn KeyStore>) -> Self {
        Self::with_kdf_params(secrets, metadata, KdfParams::default())
    }

    /// Like [`KeyManager::new`] with explicit Argon2id costs. Production
    /// callers should stick with the defaults; tests dial them down.
    pub fn with_kdf_params(
        secrets: Arc<dyn KeyStore>,
        metadata: Arc<dyn KeyStore>,
        kdf: KdfParams,
    ) -> Self {
        Self {
            secrets,
            metadata,
            kdf,
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Probes both stores with a write/read/delete round trip. Call
    /// before offering `initialize` to a user; a backend that cannot
    /// hold the key records is fatal to the whole subsystem.
    pub async fn verify_store_support(&self) -> KeyResult<()> {
        for (name, store) in [("secrets", &self.secrets), ("metadata", &self.metadata)] {
            let probe_key = "__store_probe";
            let probe_value = b"probe";

            let check = async {
                store.put(probe_key, probe_value).await?;
                let read = store.get(probe_key).await?;
                store.delete(probe_key).await?;
                Ok::<_, StoreError>(read)
            };

            match check.await {
                Ok(Some(v)) if v == probe_value => {}
                Ok(_) => {
                    return Err(KeyError::StoreUnavailable(format!(
                        "{name} store did not return written value"
                    )))
                }
                Err(e) => return Err(KeyError::StoreUnavailable(format!("{name} store: {e}"))),
            }
        }
        Ok(())
    }

    /// Whether key material has been set up for this user.
    pub async fn is_initialized(&self) -> KeyResult<bool> {
        Ok(self
            .metadata
            .get(META_INITIALIZED)
            .await?
            .is_some_and(|v| v == b"true"))
    }

    /// Whether an unlocked session currently exists.
    pub fn is_unlocked(&self) -> bool {
        self.session.read().expect("session lock poisoned").is_some()
    }

    /// First-time setup. Generates the key pair, wraps it under a
    /// password-derived master key, persists everything, opens an
    /// unlocked session and returns the one-time recovery kit.
    ///
    /// The kit's mnemonic is computable only here, only once. It is not
    /// retrievable afterward; losing both it and the password is
    /// unrecoverable data loss by design.
    pub async fn initialize(&self, password: &str) -> KeyResult<RecoveryKit> {
        let _guard = self.lifecycle.lock().await;

        if self.is_initialized().await? {
            return Err(KeyError::AlreadyInitialized);
        }
        let violations = validate_password_strength(password);
        if !violations.is_empty() {
            return Err(KeyError::WeakPassword(violations));
        }

        let salt = Salt::random();
        let master = self.derive_master(password, &salt).await?;

        debug!("generating wrapping key pair");
        let keypair = task::spawn_blocking(WrappingKeyPair::generate)
            .await
            .map_err(|e| KeyError::Internal(format!("keygen task failed: {e}")))??;

        let (mnemonic, recovery_key) = task::spawn_blocking(|| {
            let mnemonic = mariner_crypto::generate_recovery_mnemonic()?;
            let key = mariner_crypto::mnemonic_to_key(&mnemonic)?;
            Ok::<_, CryptoError>((mnemonic, key))
        })
        .await
        .map_err(|e| KeyError::Internal(format!("recovery task failed: {e}")))??;

        let private_der = keypair.private_der()?;
        let key_blob = encrypt(&master, &private_der)?;
        let recovery_blob = encrypt(&recovery_key, &private_der)?;
        let public_der = keypair.public_der()?;

        let persisted = async {
            self.persist_key_material(&salt, &key_blob, Some(&recovery_blob), Some(&public_der))
                .await?;
            self.metadata.put(META_VERSION, FORMAT_VERSION).await?;
            self.metadata.put(META_INITIALIZED, b"true").await?;
            Ok::<(), KeyError>(())
        }
        .await;
        if let Err(e) = persisted {
            // Leave no half-initialized state behind.
            warn!("initialize failed while persisting; wiping partial state");
            let _ = self.wipe_stores().await;
            return Err(e);
        }

        let kit = RecoveryKit {
            mnemonic,
            salt: BASE64.encode(salt.as_bytes()),
            public_key: BASE64.encode(&public_der),
            created_at: chrono::Utc::now(),
        };

        self.open_session(keypair);
        info!("encryption initialized");
        Ok(kit)
    }

    /// Unlocks with the password: derives the master key from the stored
    /// salt and decrypts the private key blob into a fresh session.
    ///
    /// Every failure mode past the initialization check collapses into
    /// [`KeyError::WrongCredentials`] - a caller probing with wrong
    /// passwords learns nothing about which stored value was at fault.
    /// On failure the session state is left exactly as it was.
    pub async fn unlock(&self, password: &str) -> KeyResult<()> {
        let _guard = self.lifecycle.lock().await;

        if !self.is_initialized().await? {
            return Err(KeyError::NotInitialized);
        }

        let salt = match self.read_salt().await? {
            Some(salt) => salt,
            None => return Err(KeyError::WrongCredentials),
        };
        let master = self.derive_master(password, &salt).await?;

        let keypair = match self.decrypt_stored_keypair(&master).await? {
            Some(keypair) => keypair,
            None => {
                debug!("unlock rejected");
                return Err(KeyError::WrongCredentials);
            }
        };

        self.open_session(keypair);
        info!("session unlocked");
        Ok(())
    }

    /// Re-wraps the private key under a new password. Equivalent to
    /// unlock-then-rewrap: fails with [`KeyError::WrongCredentials`] if
    /// the old password is wrong, [`KeyError::WeakPassword`] if the new
    /// one fails policy. The salt is rotated along with the password.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> KeyResult<()> {
        let _guard = self.lifecycle.lock().await;

        if !self.is_initialized().await? {
            return Err(KeyError::NotInitialized);
        }
        let violations = validate_password_strength(new_password);
        if !violations.is_empty() {
            return Err(KeyError::WeakPassword(violations));
        }

        let salt = match self.read_salt().await? {
            Some(salt) => salt,
            None => return Err(KeyError::WrongCredentials),
        };
        let old_master = self.derive_master(old_password, &salt).await?;
        let keypair = match self.decrypt_stored_keypair(&old_master).await? {
            Some(keypair) => keypair,
            None => return Err(KeyError::WrongCredentials),
        };

        self.rewrap_under_new_password(&keypair, new_password).await?;
        self.open_session(keypair);
        info!("password changed");
        Ok(())
    }

    /// Clears the in-memory key pair. Idempotent.
    pub async fn lock(&self) {
        let _guard = self.lifecycle.lock().await;
        let had_session = {
            let mut session = self.session.write().expect("session lock poisoned");
            session.take().is_some()
        };
        if had_session {
            info!("session locked");
        }
    }

    /// Current public key, for wrapping fresh document keys.
    pub fn public_key(&self) -> KeyResult<RsaPublicKey> {
        let session = self.session.read().expect("session lock poisoned");
        session
            .as_ref()
            .map(|s| s.keypair.public.clone())
            .ok_or(KeyError::Locked)
    }

    /// Current private key, for unwrapping document keys.
    pub fn private_key(&self) -> KeyResult<RsaPrivateKey> {
        let session = self.session.read().expect("session lock poisoned");
        session
            .as_ref()
            .map(|s| s.keypair.private.clone())
            .ok_or(KeyError::Locked)
    }

    /// Destroys all key material and metadata and locks the session.
    /// Documents encrypted under the destroyed key pair become
    /// permanently unreadable.
    pub async fn reset(&self) -> KeyResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.session.write().expect("session lock poisoned").take();
        self.wipe_stores().await?;
        warn!("all key material destroyed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internal helpers (lifecycle mutex held by callers where required)
    // ------------------------------------------------------------------

    fn open_session(&self, keypair: WrappingKeyPair) {
        let mut session = self.session.write().expect("session lock poisoned");
        *session = Some(Session { keypair });
    }

    async fn derive_master(&self, secret: &str, salt: &Salt) -> KeyResult<SymmetricKey> {
        let secret = secret.to_string();
        let salt = salt.clone();
        let kdf = self.kdf.clone();
        task::spawn_blocking(move || derive_key(&secret, &salt, &kdf))
            .await
            .map_err(|e| KeyError::Internal(format!("kdf task failed: {e}")))?
            .map_err(KeyError::from)
    }

    async fn read_salt(&self) -> KeyResult<Option<Salt>> {
        let Some(bytes) = self.metadata.get(META_SALT).await? else {
            return Ok(None);
        };
        Ok(Salt::from_slice(&bytes).ok())
    }

    /// Decrypts the stored private key blob with `master`. Returns
    /// `Ok(None)` on any credential-shaped failure (missing record,
    /// undecodable blob, tag mismatch, malformed DER) so callers can map
    /// it to a single opaque error.
    async fn decrypt_stored_keypair(
        &self,
        master: &SymmetricKey,
    ) -> KeyResult<Option<WrappingKeyPair>> {
        let Some(blob_bytes) = self.secrets.get(KEY_PRIVATE).await? else {
            return Ok(None);
        };
        let Ok(blob) = serde_json::from_slice::<EncryptedData>(&blob_bytes) else {
            return Ok(None);
        };
        let Ok(private_der) = decrypt(master, &blob) else {
            return Ok(None);
        };
        Ok(WrappingKeyPair::from_private_der(&private_der).ok())
    }

    /// Re-encrypts the private key under a key derived from
    /// `new_secret` with a fresh salt, and persists blob then salt.
    pub(crate) async fn rewrap_under_new_password(
        &self,
        keypair: &WrappingKeyPair,
        new_secret: &str,
    ) -> KeyResult<()> {
        let new_salt = Salt::random();
        let new_master = self.derive_master(new_secret, &new_salt).await?;

        let private_der = keypair.private_der()?;
        let new_blob = encrypt(&new_master, &private_der)?;

        // Blob first: if we crash between the two writes the account is
        // recoverable via the untouched recovery record, whereas a new
        // salt over an old blob would also strand the new password.
        self.persist_key_material(&new_salt, &new_blob, None, None)
            .await
    }

    async fn persist_key_material(
        &self,
        salt: &Salt,
        key_blob: &EncryptedData,
        recovery_blob: Option<&EncryptedData>,
        public_der: Option<&[u8]>,
    ) -> KeyResult<()> {
        self.secrets
            .put(KEY_PRIVATE, &serde_json::to_vec(key_blob)?)
            .await?;
        if let Some(blob) = recovery_blob {
            self.secrets
                .put(KEY_PRIVATE_RECOVERY, &serde_json::to_vec(blob)?)
                .await?;
        }
        if let Some(der) = public_der {
            self.secrets.put(KEY_PUBLIC, der).await?;
        }
        self.metadata.put(META_SALT, salt.as_bytes()).await?;
        Ok(())
    }

    async fn wipe_stores(&self) -> KeyResult<()> {
        self.secrets.clear().await?;
        self.metadata.clear().await?;
        Ok(())
    }

    /// Stored public key in SPKI DER, readable without unlocking. Used
    /// for status displays and recovery kit verification.
    pub async fn stored_public_key_der(&self) -> KeyResult<Option<Vec<u8>>> {
        Ok(self.secrets.get(KEY_PUBLIC).await?)
    }
}
