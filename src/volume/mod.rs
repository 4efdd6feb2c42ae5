//! Encrypted volume engine interface.
//!
//! The engine owns key derivation, decryption and the on-disk format of a
//! volume. The router only sees the operations below, all addressed by
//! volume-relative plaintext paths (`/` is the volume root).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::storage::{ByteStream, StorageBackend, StorageError};
use crate::vfs::VirtualPath;

/// Configuration file that marks a directory as the root of an encrypted volume
pub const DEFAULT_MARKER_FILE: &str = ".encfs6.xml";

/// Result type for operations on an unlocked volume
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors reported by an unlocked volume
#[derive(Debug, Clone, Error)]
pub enum VolumeError {
    #[error("not found in volume: {0}")]
    NotFound(String),

    #[error("not a directory in volume: {0}")]
    NotADirectory(String),

    #[error("is a directory in volume: {0}")]
    IsADirectory(String),

    #[error("corrupt volume data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl VolumeError {
    pub fn is_not_found(&self) -> bool {
        match self {
            VolumeError::NotFound(_) => true,
            VolumeError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Why an unlock handshake failed
#[derive(Debug, Clone, Error)]
pub enum UnlockError {
    #[error("invalid password")]
    InvalidPassword,

    #[error("corrupt volume header: {0}")]
    CorruptHeader(String),

    #[error("failed to read volume header: {0}")]
    Storage(#[from] StorageError),
}

/// A file or directory inside an unlocked volume
#[async_trait]
pub trait VolumeFile: Send + Sync + fmt::Debug {
    /// Plaintext path relative to the volume root
    fn path(&self) -> &VirtualPath;

    /// Plaintext name; `/` for the volume root
    fn name(&self) -> &str;

    fn is_directory(&self) -> bool;

    fn last_modified(&self) -> Option<DateTime<Utc>>;

    /// Plaintext length in bytes
    fn length(&self) -> u64;

    /// Ciphertext path of this file inside the volume, without the mount root
    fn encrypted_path(&self) -> &str;

    async fn open_read(&self) -> VolumeResult<ByteStream>;
}

/// Shared handle to a file inside a volume
pub type FileHandle = Arc<dyn VolumeFile>;

/// An unlocked volume
#[async_trait]
pub trait Volume: Send + Sync {
    async fn get_file(&self, path: &VirtualPath) -> VolumeResult<FileHandle>;

    /// Children of a directory, in volume order
    async fn list_files(&self, dir: &VirtualPath) -> VolumeResult<Vec<FileHandle>>;

    async fn open_read(&self, path: &VirtualPath) -> VolumeResult<ByteStream> {
        let file = self.get_file(path).await?;
        if file.is_directory() {
            return Err(VolumeError::IsADirectory(path.to_string()));
        }
        file.open_read().await
    }
}

/// Shared handle to an unlocked volume
pub type VolumeHandle = Arc<dyn Volume>;

/// Builds unlocked volumes from a password and a root-scoped storage view
#[async_trait]
pub trait VolumeEngine: Send + Sync {
    /// File name whose presence in a listing marks the directory as a volume root
    fn marker_file_name(&self) -> &str {
        DEFAULT_MARKER_FILE
    }

    /// Run the unlock handshake; `storage` sees the volume root as `/`
    async fn unlock(
        &self,
        storage: Arc<dyn StorageBackend>,
        password: &str,
    ) -> Result<VolumeHandle, UnlockError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{bytes_stream, collect_bytes};
    use bytes::Bytes;

    #[derive(Debug)]
    struct StubFile {
        path: VirtualPath,
        dir: bool,
    }

    #[async_trait]
    impl VolumeFile for StubFile {
        fn path(&self) -> &VirtualPath {
            &self.path
        }
        fn name(&self) -> &str {
            self.path.name().unwrap_or("/")
        }
        fn is_directory(&self) -> bool {
            self.dir
        }
        fn last_modified(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn length(&self) -> u64 {
            4
        }
        fn encrypted_path(&self) -> &str {
            "/Zm9v"
        }
        async fn open_read(&self) -> VolumeResult<ByteStream> {
            Ok(bytes_stream(Bytes::from_static(b"data")))
        }
    }

    struct StubVolume;

    #[async_trait]
    impl Volume for StubVolume {
        async fn get_file(&self, path: &VirtualPath) -> VolumeResult<FileHandle> {
            Ok(Arc::new(StubFile {
                path: path.clone(),
                dir: path.is_root(),
            }))
        }
        async fn list_files(&self, _dir: &VirtualPath) -> VolumeResult<Vec<FileHandle>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_default_open_read_goes_through_get_file() {
        let stream = StubVolume.open_read(&VirtualPath::parse("/f")).await.unwrap();
        assert_eq!(&collect_bytes(stream).await.unwrap()[..], b"data");

        let dir = StubVolume.open_read(&VirtualPath::root()).await;
        assert!(matches!(dir, Err(VolumeError::IsADirectory(_))));
    }

    #[test]
    fn test_storage_not_found_counts_as_not_found() {
        let err = VolumeError::from(StorageError::NotFound("/x".into()));
        assert!(err.is_not_found());
        assert!(!VolumeError::Corrupt("bad block".into()).is_not_found());
    }
}
