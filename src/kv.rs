//! Key-value persistence boundary.
//!
//! [`KvStore`] is the only thing the feedback store knows about storage: a
//! key either holds a serialized value or is absent. [`MemoryKv`] and
//! [`DirectoryKv`] live here; the Postgres backend is in [`crate::db`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{FeedbackError, Result};

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the bytes stored under `key`, or `None` if the key was never written.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the value under `key`. Either the whole value lands or nothing changes.
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
pub struct DirectoryKv {
    dir: PathBuf,
}

impl DirectoryKv {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened directory store");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(FeedbackError::Storage(format!("invalid store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KvStore for DirectoryKv {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn memory_reads_absent_key_as_none() {
        let kv = MemoryKv::new();
        assert_eq!(kv.read("missing").await.unwrap(), None);
        kv.write("k", b"[1]").await.unwrap();
        assert_eq!(kv.read("k").await.unwrap(), Some(b"[1]".to_vec()));
    }

    #[tokio::test]
    async fn directory_store_persists_across_handles() {
        let dir = std::env::temp_dir().join(format!("campus-feedback-{}", Uuid::new_v4()));
        let kv = DirectoryKv::open(&dir).await.unwrap();
        assert_eq!(kv.read("courses_data").await.unwrap(), None);
        kv.write("courses_data", b"[]").await.unwrap();
        kv.write("courses_data", b"[{}]").await.unwrap();

        let reopened = DirectoryKv::open(&dir).await.unwrap();
        assert_eq!(
            reopened.read("courses_data").await.unwrap(),
            Some(b"[{}]".to_vec())
        );
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn directory_store_rejects_path_like_keys() {
        let dir = std::env::temp_dir().join(format!("campus-feedback-{}", Uuid::new_v4()));
        let kv = DirectoryKv::open(&dir).await.unwrap();
        assert!(matches!(
            kv.write("../escape", b"x").await,
            Err(FeedbackError::Storage(_))
        ));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
