//! vaultsh: one path-addressable view over remote storage, with encrypted
//! volumes discovered while listing and unlocked on demand.

pub mod cache;
pub mod error;
pub mod providers;
pub mod s3;
pub mod shell;
pub mod storage;
pub mod vfs;
pub mod volume;

pub use error::{VaultError, VaultResult};
pub use storage::{FileInfo, StorageBackend, StorageError};
pub use vfs::{PathRouter, VirtualPath};
pub use volume::{UnlockError, Volume, VolumeEngine, VolumeFile};
