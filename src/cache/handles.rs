use std::collections::BTreeMap;

use crate::vfs::VirtualPath;
use crate::volume::FileHandle;

/// Volume file handles keyed by absolute plaintext path
///
/// Only paths inside unlocked volumes land here. Iteration is in path order,
/// which makes [`FileHandleCache::find_by_encrypted_suffix`] deterministic.
#[derive(Default)]
pub struct FileHandleCache {
    handles: BTreeMap<VirtualPath, FileHandle>,
}

impl FileHandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: VirtualPath, handle: FileHandle) {
        self.handles.insert(path, handle);
    }

    pub fn get(&self, path: &VirtualPath) -> Option<FileHandle> {
        self.handles.get(path).cloned()
    }

    pub fn remove_subtree(&mut self, root: &VirtualPath) -> usize {
        let before = self.handles.len();
        self.handles.retain(|path, _| !path.starts_with(root));
        before - self.handles.len()
    }

    /// First cached plaintext path whose handle's volume-internal ciphertext
    /// path is a suffix of `ciphertext`
    ///
    /// Best effort: handles from different volumes sharing a suffix are not
    /// told apart, and only already-resolved paths can be found.
    pub fn find_by_encrypted_suffix(&self, ciphertext: &str) -> Option<VirtualPath> {
        self.handles
            .iter()
            .find(|(_, handle)| {
                let encrypted = handle.encrypted_path();
                !encrypted.is_empty() && ciphertext.ends_with(encrypted)
            })
            .map(|(path, _)| path.clone())
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
