//! Blob storage for uploaded files

use crate::errors::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Stores raw file bytes and hands back a path to retrieve them by
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, returning the retrievable path
    async fn put(&self, key: &str, data: &[u8]) -> Result<String>;

    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Files on the local filesystem below a base directory
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<String> {
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        tracing::debug!(path = %path.display(), bytes = data.len(), "Stored blob");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
