use thiserror::Error;

use crate::storage::StorageError;
use crate::vfs::VirtualPath;
use crate::volume::{UnlockError, VolumeError};

/// Result type for router operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors reported by the path router
///
/// Cloneable so that one delegate result can be handed to every caller
/// waiting on the same path.
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    #[error("not found: {0}")]
    NotFound(VirtualPath),

    #[error("not a directory: {0}")]
    NotADirectory(VirtualPath),

    #[error("is a directory: {0}")]
    IsADirectory(VirtualPath),

    /// A path matched a registered root that has no volume behind it
    #[error("no unlocked volume registered for {0}")]
    InvalidEncryptedPath(VirtualPath),

    #[error("failed to unlock {root}: {source}")]
    UnlockFailed {
        root: VirtualPath,
        #[source]
        source: UnlockError,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("volume error: {0}")]
    Volume(#[from] VolumeError),
}

impl VaultError {
    /// Map a backend failure for `path`, keeping not-found and unsupported distinct
    pub(crate) fn from_storage(path: &VirtualPath, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => VaultError::NotFound(path.clone()),
            StorageError::Unsupported(op) => VaultError::Unsupported(op),
            other => VaultError::Storage(other),
        }
    }

    /// Map a volume failure for `path`, keeping not-found and unsupported distinct
    pub(crate) fn from_volume(path: &VirtualPath, err: VolumeError) -> Self {
        match err {
            VolumeError::Storage(inner) => Self::from_storage(path, inner),
            e if e.is_not_found() => VaultError::NotFound(path.clone()),
            other => VaultError::Volume(other),
        }
    }

    /// Whether the caller can retry, e.g. with a different password
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::UnlockFailed { .. } | VaultError::Storage(StorageError::Io(_)))
    }
}
