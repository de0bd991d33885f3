//! Full key lifecycle against in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use mariner_crypto::KdfParams;
use mariner_keystore::{FileKeyStore, KeyStore, MemoryKeyStore, StoreError, StoreResult};
use mariner_vault::{KeyError, KeyManager};

const PASSWORD: &str = "Str0ng!Passw0rd123";
const NEW_PASSWORD: &str = "An0ther$trongPass1";

// Argon2id at minimum cost; key generation still dominates each test.
fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

fn manager() -> (KeyManager, MemoryKeyStore, MemoryKeyStore) {
    let secrets = MemoryKeyStore::new();
    let metadata = MemoryKeyStore::new();
    let mgr = KeyManager::with_kdf_params(
        Arc::new(secrets.clone()),
        Arc::new(metadata.clone()),
        fast_kdf(),
    );
    (mgr, secrets, metadata)
}

#[tokio::test]
async fn initialize_unlocks_and_returns_kit() {
    let (mgr, secrets, _) = manager();

    assert!(!mgr.is_initialized().await.unwrap());
    assert!(!mgr.is_unlocked());

    let kit = mgr.initialize(PASSWORD).await.unwrap();

    assert_eq!(kit.mnemonic.split_whitespace().count(), 24);
    assert!(!kit.salt.is_empty());
    assert!(!kit.public_key.is_empty());

    assert!(mgr.is_initialized().await.unwrap());
    assert!(mgr.is_unlocked());
    assert!(mgr.has_recovery().await.unwrap());
    mgr.public_key().unwrap();
    mgr.private_key().unwrap();

    // Persisted records: wrapped private key (twice) plus public key.
    assert!(secrets.get("private_key").await.unwrap().is_some());
    assert!(secrets.get("private_key_recovery").await.unwrap().is_some());
    assert!(secrets.get("public_key").await.unwrap().is_some());
}

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();
    assert!(matches!(
        mgr.initialize(PASSWORD).await,
        Err(KeyError::AlreadyInitialized)
    ));
}

#[tokio::test]
async fn weak_password_is_rejected_with_violations() {
    let (mgr, _, _) = manager();
    let err = mgr
        .initialize("short")
        .await
        .err()
        .expect("weak password accepted");
    match err {
        KeyError::WeakPassword(violations) => assert!(!violations.is_empty()),
        other => panic!("expected WeakPassword, got {other:?}"),
    }
    // Nothing was persisted by the failed attempt.
    assert!(!mgr.is_initialized().await.unwrap());
}

#[tokio::test]
async fn unlock_before_initialize_fails() {
    let (mgr, _, _) = manager();
    assert!(matches!(
        mgr.unlock(PASSWORD).await,
        Err(KeyError::NotInitialized)
    ));
}

#[tokio::test]
async fn lock_then_unlock_roundtrip() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();

    mgr.lock().await;
    assert!(!mgr.is_unlocked());
    assert!(matches!(mgr.public_key(), Err(KeyError::Locked)));
    assert!(matches!(mgr.private_key(), Err(KeyError::Locked)));
    // Idempotent
    mgr.lock().await;

    mgr.unlock(PASSWORD).await.unwrap();
    assert!(mgr.is_unlocked());
}

#[tokio::test]
async fn wrong_password_is_opaque_and_leaves_state_alone() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();
    mgr.lock().await;

    assert!(matches!(
        mgr.unlock("Wr0ng!Password999").await,
        Err(KeyError::WrongCredentials)
    ));
    assert!(!mgr.is_unlocked());

    // A failed unlock while unlocked must not drop the session.
    mgr.unlock(PASSWORD).await.unwrap();
    assert!(matches!(
        mgr.unlock("Wr0ng!Password999").await,
        Err(KeyError::WrongCredentials)
    ));
    assert!(mgr.is_unlocked());
}

#[tokio::test]
async fn change_password_rotates_credentials_not_keys() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();
    let public_before = mgr.stored_public_key_der().await.unwrap().unwrap();

    mgr.change_password(PASSWORD, NEW_PASSWORD).await.unwrap();
    assert!(mgr.is_unlocked());

    mgr.lock().await;
    assert!(matches!(
        mgr.unlock(PASSWORD).await,
        Err(KeyError::WrongCredentials)
    ));
    mgr.unlock(NEW_PASSWORD).await.unwrap();

    // Same key pair under the new password.
    let public_after = mgr.stored_public_key_der().await.unwrap().unwrap();
    assert_eq!(public_before, public_after);
}

#[tokio::test]
async fn change_password_checks_old_and_new() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();

    assert!(matches!(
        mgr.change_password("Wr0ng!Password999", NEW_PASSWORD).await,
        Err(KeyError::WrongCredentials)
    ));
    assert!(matches!(
        mgr.change_password(PASSWORD, "weak").await,
        Err(KeyError::WeakPassword(_))
    ));
    // Old password still works after both failures.
    mgr.lock().await;
    mgr.unlock(PASSWORD).await.unwrap();
}

#[tokio::test]
async fn recovery_replaces_password_and_keeps_keys() {
    let (mgr, _, _) = manager();
    let kit = mgr.initialize(PASSWORD).await.unwrap();
    let public_before = mgr.stored_public_key_der().await.unwrap().unwrap();
    mgr.lock().await;

    mgr.recover_with_phrase(&kit.mnemonic, NEW_PASSWORD)
        .await
        .unwrap();
    assert!(mgr.is_unlocked());

    mgr.lock().await;
    assert!(matches!(
        mgr.unlock(PASSWORD).await,
        Err(KeyError::WrongCredentials)
    ));
    mgr.unlock(NEW_PASSWORD).await.unwrap();
    assert_eq!(
        mgr.stored_public_key_der().await.unwrap().unwrap(),
        public_before
    );

    // The kit survives recovery and further password changes.
    assert!(mgr.has_recovery().await.unwrap());
}

#[tokio::test]
async fn recovery_kit_survives_password_change() {
    let (mgr, _, _) = manager();
    let kit = mgr.initialize(PASSWORD).await.unwrap();
    mgr.change_password(PASSWORD, NEW_PASSWORD).await.unwrap();
    mgr.lock().await;

    mgr.recover_with_phrase(&kit.mnemonic, "Th1rd&FinalPass99")
        .await
        .unwrap();
    assert!(mgr.is_unlocked());
}

#[tokio::test]
async fn garbled_recovery_phrase_is_invalid() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();
    mgr.lock().await;

    assert!(matches!(
        mgr.recover_with_phrase("not a real phrase", NEW_PASSWORD).await,
        Err(KeyError::InvalidRecoveryPhrase)
    ));
    assert!(!mgr.is_unlocked());
}

#[tokio::test]
async fn someone_elses_phrase_is_a_mismatch() {
    let (mgr, _, _) = manager();
    mgr.initialize(PASSWORD).await.unwrap();
    mgr.lock().await;

    // Checksum-valid 24-word phrase that belongs to no one.
    let foreign = mariner_crypto::generate_recovery_mnemonic().unwrap();
    assert!(matches!(
        mgr.recover_with_phrase(&foreign, NEW_PASSWORD).await,
        Err(KeyError::RecoveryKeyMismatch)
    ));
    assert!(!mgr.is_unlocked());
    // The real password still unlocks.
    mgr.unlock(PASSWORD).await.unwrap();
}

#[tokio::test]
async fn recovery_before_initialize_fails() {
    let (mgr, _, _) = manager();
    let phrase = mariner_crypto::generate_recovery_mnemonic().unwrap();
    assert!(matches!(
        mgr.recover_with_phrase(&phrase, NEW_PASSWORD).await,
        Err(KeyError::NotInitialized)
    ));
}

#[tokio::test]
async fn reset_destroys_everything() {
    let (mgr, secrets, metadata) = manager();
    mgr.initialize(PASSWORD).await.unwrap();

    mgr.reset().await.unwrap();

    assert!(!mgr.is_unlocked());
    assert!(!mgr.is_initialized().await.unwrap());
    assert!(secrets.get("private_key").await.unwrap().is_none());
    assert!(metadata.get("salt").await.unwrap().is_none());
    assert!(matches!(
        mgr.unlock(PASSWORD).await,
        Err(KeyError::NotInitialized)
    ));
}

#[tokio::test]
async fn verify_store_support_passes_on_working_stores() {
    let (mgr, _, _) = manager();
    mgr.verify_store_support().await.unwrap();
}

/// Backend whose writes fail outright.
struct FailingStore;

#[async_trait]
impl KeyStore for FailingStore {
    async fn put(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(StoreError::Backend("disk full".into()))
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Backend that accepts writes but never returns them.
struct ForgetfulStore;

#[async_trait]
impl KeyStore for ForgetfulStore {
    async fn put(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Delegates to an inner memory store but refuses writes to one key.
struct TrippingStore {
    inner: MemoryKeyStore,
    trip_key: &'static str,
}

#[async_trait]
impl KeyStore for TrippingStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if key == self.trip_key {
            return Err(StoreError::Backend("write refused".into()));
        }
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.inner.clear().await
    }
}

#[tokio::test]
async fn verify_store_support_reports_erroring_backend() {
    let mgr = KeyManager::with_kdf_params(
        Arc::new(FailingStore),
        Arc::new(MemoryKeyStore::new()),
        fast_kdf(),
    );
    assert!(matches!(
        mgr.verify_store_support().await,
        Err(KeyError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn verify_store_support_reports_backend_that_drops_writes() {
    let mgr = KeyManager::with_kdf_params(
        Arc::new(MemoryKeyStore::new()),
        Arc::new(ForgetfulStore),
        fast_kdf(),
    );
    assert!(matches!(
        mgr.verify_store_support().await,
        Err(KeyError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn failed_initialize_leaves_no_partial_state() {
    let secrets = MemoryKeyStore::new();
    let metadata = MemoryKeyStore::new();
    // Key material persists fine, then the final flag write fails.
    let mgr = KeyManager::with_kdf_params(
        Arc::new(secrets.clone()),
        Arc::new(TrippingStore {
            inner: metadata.clone(),
            trip_key: "initialized",
        }),
        fast_kdf(),
    );

    assert!(mgr.initialize(PASSWORD).await.is_err());

    assert!(!mgr.is_unlocked());
    assert!(!mgr.is_initialized().await.unwrap());
    assert!(secrets.get("private_key").await.unwrap().is_none());
    assert!(secrets.get("private_key_recovery").await.unwrap().is_none());
    assert!(secrets.get("public_key").await.unwrap().is_none());
    assert!(metadata.get("salt").await.unwrap().is_none());
}

#[tokio::test]
async fn recovery_works_with_damaged_metadata() {
    let (mgr, _, metadata) = manager();
    let kit = mgr.initialize(PASSWORD).await.unwrap();
    mgr.lock().await;

    // Lose the salt, version and initialized flag; the key material in
    // the secrets store is intact.
    metadata.clear().await.unwrap();
    assert!(!mgr.is_initialized().await.unwrap());

    mgr.recover_with_phrase(&kit.mnemonic, NEW_PASSWORD)
        .await
        .unwrap();
    assert!(mgr.is_unlocked());
    assert!(mgr.is_initialized().await.unwrap());

    mgr.lock().await;
    mgr.unlock(NEW_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn lifecycle_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let secrets_dir = dir.path().join("secrets");
    let metadata_dir = dir.path().join("metadata");

    let kit = {
        let mgr = KeyManager::with_kdf_params(
            Arc::new(FileKeyStore::open(&secrets_dir).await.unwrap()),
            Arc::new(FileKeyStore::open(&metadata_dir).await.unwrap()),
            fast_kdf(),
        );
        mgr.initialize(PASSWORD).await.unwrap()
    };

    // A fresh manager over the same directories models a process restart:
    // initialized but locked.
    let mgr = KeyManager::with_kdf_params(
        Arc::new(FileKeyStore::open(&secrets_dir).await.unwrap()),
        Arc::new(FileKeyStore::open(&metadata_dir).await.unwrap()),
        fast_kdf(),
    );
    assert!(mgr.is_initialized().await.unwrap());
    assert!(!mgr.is_unlocked());

    mgr.unlock(PASSWORD).await.unwrap();
    mgr.public_key().unwrap();

    // Recovery material also survived the restart.
    mgr.lock().await;
    mgr.recover_with_phrase(&kit.mnemonic, NEW_PASSWORD)
        .await
        .unwrap();
    assert!(mgr.is_unlocked());
}
