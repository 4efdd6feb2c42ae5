//! Path-scoping adapter.
//!
//! Presents a subtree of another backend as if it were a whole backend: every
//! path argument is prefixed with a fixed root and every returned path has
//! that root stripped again. Volume engines are handed one of these during
//! unlock so they can address their files without knowing the mount point.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ByteSink, ByteStream, FileInfo, StorageBackend, StorageError, StorageResult};
use crate::vfs::VirtualPath;

pub struct ScopedBackend {
    root: VirtualPath,
    inner: Arc<dyn StorageBackend>,
}

impl ScopedBackend {
    pub fn new(root: VirtualPath, inner: Arc<dyn StorageBackend>) -> Self {
        Self { root, inner }
    }

    /// The backend path this view is rooted at
    pub fn root(&self) -> &VirtualPath {
        &self.root
    }

    fn scope(&self, path: &VirtualPath) -> VirtualPath {
        self.root.concat(path)
    }

    fn unscope(&self, mut info: FileInfo) -> StorageResult<FileInfo> {
        match info.path.strip_prefix(&self.root) {
            Some(relative) => {
                info.path = relative;
                Ok(info)
            }
            None => Err(StorageError::InvalidPath(info.path.to_string())),
        }
    }
}

#[async_trait]
impl StorageBackend for ScopedBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_info(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        let info = self.inner.get_info(&self.scope(path)).await?;
        self.unscope(info)
    }

    async fn list(&self, dir: &VirtualPath) -> StorageResult<Vec<FileInfo>> {
        self.inner
            .list(&self.scope(dir))
            .await?
            .into_iter()
            .map(|info| self.unscope(info))
            .collect()
    }

    async fn open_read(&self, path: &VirtualPath) -> StorageResult<ByteStream> {
        self.inner.open_read(&self.scope(path)).await
    }

    async fn exists(&self, path: &VirtualPath) -> StorageResult<bool> {
        self.inner.exists(&self.scope(path)).await
    }

    async fn is_directory(&self, path: &VirtualPath) -> StorageResult<bool> {
        self.inner.is_directory(&self.scope(path)).await
    }

    async fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> StorageResult<()> {
        self.inner.rename(&self.scope(from), &self.scope(to)).await
    }

    async fn delete(&self, path: &VirtualPath) -> StorageResult<()> {
        self.inner.delete(&self.scope(path)).await
    }

    async fn mkdir(&self, path: &VirtualPath) -> StorageResult<()> {
        self.inner.mkdir(&self.scope(path)).await
    }

    async fn mkdirs(&self, path: &VirtualPath) -> StorageResult<()> {
        self.inner.mkdirs(&self.scope(path)).await
    }

    async fn create_file(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        let info = self.inner.create_file(&self.scope(path)).await?;
        self.unscope(info)
    }

    async fn copy(&self, from: &VirtualPath, to: &VirtualPath) -> StorageResult<()> {
        self.inner.copy(&self.scope(from), &self.scope(to)).await
    }

    async fn open_write(&self, path: &VirtualPath, length: u64) -> StorageResult<ByteSink> {
        self.inner.open_write(&self.scope(path), length).await
    }
}
