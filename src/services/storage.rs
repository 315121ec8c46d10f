//! Content store
//!
//! Named byte objects addressed by slash-separated paths such as
//! `/2024/05/17/cat.png`. `LocalContentStore` keeps them under a root
//! directory on the local filesystem.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Error types for content store operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Path is empty or would leave the store root
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend for uploaded files
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a folder and its parents. Succeeds if it already exists.
    async fn ensure_dir(&self, path: &str) -> StorageResult<()>;

    /// Atomically reserve `path` as an empty object.
    ///
    /// Returns `false` without touching anything if the path is taken.
    async fn create_new(&self, path: &str) -> StorageResult<bool>;

    /// Write the object, replacing previous contents
    async fn write(&self, path: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Read the object, or `None` if it does not exist
    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Delete the object. Returns whether something was removed.
    async fn delete(&self, path: &str) -> StorageResult<bool>;
}

pub type DynContentStore = Arc<dyn ContentStore>;

/// Filesystem-backed content store
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn boxed(root: impl Into<PathBuf>) -> DynContentStore {
        Arc::new(Self::new(root))
    }

    /// Map a store path onto the filesystem, refusing anything that is not
    /// a plain relative path below the root.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut depth = 0;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(path.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn ensure_dir(&self, path: &str) -> StorageResult<()> {
        let dir = self.resolve(path)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn create_new(&self, path: &str) -> StorageResult<bool> {
        let file = self.resolve(path)?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        let file = self.resolve(path)?;
        fs::write(&file, bytes).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match fs::read(&file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let file = self.resolve(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalContentStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalContentStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let (_dir, store) = store();

        assert!(store.resolve("/2024/01/02/cat.png").is_ok());
        assert!(store.resolve("2024/./cat.png").is_ok());
        assert!(matches!(
            store.resolve("/2024/../../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(store.resolve("/"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(store.resolve(""), Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_ensure_dir_idempotent() {
        let (dir, store) = store();

        store.ensure_dir("/2024/01/02/").await.unwrap();
        store.ensure_dir("/2024/01/02/").await.unwrap();

        assert!(dir.path().join("2024/01/02").is_dir());
    }

    #[tokio::test]
    async fn test_create_new_reserves_once() {
        let (_dir, store) = store();
        store.ensure_dir("/a").await.unwrap();

        assert!(store.create_new("/a/cat.png").await.unwrap());
        assert!(!store.create_new("/a/cat.png").await.unwrap());
        assert_eq!(store.read("/a/cat.png").await.unwrap().as_deref(), Some(&b""[..]));
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (_dir, store) = store();
        store.ensure_dir("/a").await.unwrap();

        store.write("/a/file.bin", b"hello").await.unwrap();
        assert_eq!(store.read("/a/file.bin").await.unwrap().as_deref(), Some(&b"hello"[..]));

        assert!(store.delete("/a/file.bin").await.unwrap());
        assert!(!store.delete("/a/file.bin").await.unwrap());
        assert!(store.read("/a/file.bin").await.unwrap().is_none());
    }
}
