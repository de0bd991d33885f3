//! File-backed key store.
//!
//! One file per key under a root directory. Writes go to a temporary
//! file first and are renamed into place, so a crashed write never
//! leaves a half-written value behind (rename is atomic on the
//! filesystems we care about).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{KeyStore, StoreError, StoreResult};

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot create store root {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are logical names, not paths. Hex-encode so any key is a
        // safe flat filename on every platform.
        self.root.join(format!("{}.bin", hex::encode(key)))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");

        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key, bytes = value.len(), "keystore put");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        debug!(root = %self.root.display(), "keystore cleared");
        Ok(())
    }
}
