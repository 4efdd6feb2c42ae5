//! Storage backend abstraction.
//!
//! A storage backend is the flat, plaintext view of the remote store. It
//! knows nothing about encrypted volumes: ciphertext files are just files.

pub mod memory;
pub mod scoped;

pub use memory::MemoryBackend;
pub use scoped::ScopedBackend;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWrite;

use crate::vfs::VirtualPath;

/// Byte stream returned by read operations
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Byte sink returned by write operations
pub type ByteSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a storage backend
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(path: &VirtualPath) -> Self {
        Self::NotFound(path.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(Arc::new(e))
        }
    }
}

/// Metadata for one plaintext path on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Full path of the entry
    pub path: VirtualPath,
    pub is_directory: bool,
    /// Modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// Byte length (0 for directories)
    pub size: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl FileInfo {
    /// A readable file of `size` bytes
    pub fn file(path: VirtualPath, size: u64) -> Self {
        Self {
            path,
            is_directory: false,
            last_modified: None,
            size,
            readable: true,
            writable: false,
            executable: false,
        }
    }

    /// A readable directory
    pub fn directory(path: VirtualPath) -> Self {
        Self {
            path,
            is_directory: true,
            last_modified: None,
            size: 0,
            readable: true,
            writable: false,
            executable: true,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(modified);
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Entry name; `/` for the root
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or("/")
    }

    /// Path of the containing directory (`None` for the root)
    pub fn parent_path(&self) -> Option<VirtualPath> {
        self.path.parent()
    }
}

/// Plaintext storage operations consumed by the router.
///
/// Read-side operations are required. Write-side operations default to
/// [`StorageError::Unsupported`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Metadata for a single path
    async fn get_info(&self, path: &VirtualPath) -> StorageResult<FileInfo>;

    /// Entries directly inside a directory, in backend order
    async fn list(&self, dir: &VirtualPath) -> StorageResult<Vec<FileInfo>>;

    /// Open a file for reading
    async fn open_read(&self, path: &VirtualPath) -> StorageResult<ByteStream>;

    async fn exists(&self, path: &VirtualPath) -> StorageResult<bool> {
        match self.get_info(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn is_directory(&self, path: &VirtualPath) -> StorageResult<bool> {
        Ok(self.get_info(path).await?.is_directory)
    }

    async fn rename(&self, _from: &VirtualPath, _to: &VirtualPath) -> StorageResult<()> {
        Err(StorageError::Unsupported("rename"))
    }

    async fn delete(&self, _path: &VirtualPath) -> StorageResult<()> {
        Err(StorageError::Unsupported("delete"))
    }

    async fn mkdir(&self, _path: &VirtualPath) -> StorageResult<()> {
        Err(StorageError::Unsupported("mkdir"))
    }

    async fn mkdirs(&self, _path: &VirtualPath) -> StorageResult<()> {
        Err(StorageError::Unsupported("mkdirs"))
    }

    async fn create_file(&self, _path: &VirtualPath) -> StorageResult<FileInfo> {
        Err(StorageError::Unsupported("create_file"))
    }

    async fn copy(&self, _from: &VirtualPath, _to: &VirtualPath) -> StorageResult<()> {
        Err(StorageError::Unsupported("copy"))
    }

    /// Open a file for writing; `length` is the number of bytes that will be written
    async fn open_write(&self, _path: &VirtualPath, _length: u64) -> StorageResult<ByteSink> {
        Err(StorageError::Unsupported("open_write"))
    }

    /// Release any session held with the remote store
    async fn disconnect(&self) {}
}

/// Drain a byte stream into one buffer
pub async fn collect_bytes(mut stream: ByteStream) -> io::Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

/// A stream yielding `data` as a single chunk
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}
