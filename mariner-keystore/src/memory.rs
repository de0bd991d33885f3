//! In-memory key store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::{KeyStore, StoreError, StoreResult};

/// HashMap-backed store. Volatile by nature, which makes it both the
/// standard test double and a faithful model of tab-scoped session
/// storage: dropping the store drops everything in it.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        Ok(inner.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryKeyStore::new();

        assert_eq!(store.get("missing").await.unwrap(), None);

        store.put("salt", b"0123456789abcdef").await.unwrap();
        assert_eq!(
            store.get("salt").await.unwrap().as_deref(),
            Some(b"0123456789abcdef".as_ref())
        );

        store.delete("salt").await.unwrap();
        assert_eq!(store.get("salt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryKeyStore::new();
        store.put("k", b"first").await.unwrap();
        store.put("k", b"second").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(b"second".as_ref()));
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let store = MemoryKeyStore::new();
        store.put("a", b"1").await.unwrap();
        store.put("b", b"2").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let store = MemoryKeyStore::new();
        store.delete("never-existed").await.unwrap();
    }
}
