use chrono::{DateTime, Utc};

use super::VirtualPath;
use crate::storage::FileInfo;
use crate::volume::VolumeFile;

/// Whether a directory is the root of an encrypted volume
///
/// Stays `Unknown` until the directory itself has been listed, because the
/// volume marker file is only ever seen as an entry of that listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootState {
    #[default]
    Unknown,
    Encrypted,
    Plain,
}

impl RootState {
    pub fn from_marker_seen(seen: bool) -> Self {
        if seen {
            RootState::Encrypted
        } else {
            RootState::Plain
        }
    }

    /// `None` while unknown
    pub fn as_bool(self) -> Option<bool> {
        match self {
            RootState::Unknown => None,
            RootState::Encrypted => Some(true),
            RootState::Plain => Some(false),
        }
    }
}

/// Cached metadata for one resolved plaintext path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: VirtualPath,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
    pub root_state: RootState,
    /// Byte length; meaningless for directories
    pub size: u64,
    /// Listed children, or `None` if this directory has not been listed yet
    pub children: Option<Vec<VirtualPath>>,
}

impl CacheEntry {
    /// Entry for a path resolved through the storage backend
    pub fn from_file_info(path: VirtualPath, info: &FileInfo) -> Self {
        Self {
            path,
            last_modified: info.last_modified,
            is_directory: info.is_directory,
            root_state: RootState::Unknown,
            size: info.size,
            children: None,
        }
    }

    /// Entry for a path resolved through an unlocked volume
    pub fn from_volume_file(path: VirtualPath, file: &dyn VolumeFile) -> Self {
        Self {
            path,
            last_modified: file.last_modified(),
            is_directory: file.is_directory(),
            root_state: RootState::Unknown,
            size: file.length(),
            children: None,
        }
    }

    pub fn is_encrypted_root(&self) -> Option<bool> {
        self.root_state.as_bool()
    }

    /// Whether a listing is attached
    pub fn is_listed(&self) -> bool {
        self.children.is_some()
    }

    /// Take fresh metadata from `newer`, keeping listing state when the
    /// entry is still the same kind of node
    pub fn refresh(&mut self, newer: CacheEntry) {
        if self.is_directory != newer.is_directory {
            *self = newer;
            return;
        }
        self.last_modified = newer.last_modified;
        self.size = newer.size;
    }
}
