//! Asynchronous keyed stores backing the key manager.
//!
//! The key manager owns two [`KeyStore`] instances with different trust
//! levels: a secret-capable store for the encrypted private key and the
//! public key, and a plain metadata store for salt / version / flags.
//! Namespace separation is by instance - nothing in this crate mixes the
//! two, and the metadata store never sees secrets.
//!
//! Operations are atomic per key; concurrent writers to the same key race
//! last-write-wins. The key manager serializes all lifecycle writes, so
//! this is sufficient.

mod file;
mod memory;

pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A keyed byte store. Backends decide durability: in-memory for tests
/// and tab-scoped session state, files for native persistence, or
/// anything else (OS keychain, embedded database) that honors per-key
/// atomicity.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;
}
