pub mod handles;

use std::collections::BTreeMap;

use crate::vfs::{CacheEntry, RootState, VirtualPath};

pub use handles::FileHandleCache;

/// Metadata for every resolved plaintext path
///
/// Unbounded: an entry exists exactly when its path has been resolved, so
/// nothing is ever evicted except by [`MetadataCache::remove_subtree`].
/// Not internally synchronised; the router guards it.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: BTreeMap<VirtualPath, CacheEntry>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &VirtualPath) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &VirtualPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert a freshly resolved entry, refreshing an existing one in place
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self.entries.get_mut(&entry.path) {
            Some(existing) => existing.refresh(entry),
            None => {
                self.entries.insert(entry.path.clone(), entry);
            }
        }
    }

    /// Replace whatever is stored for the entry's path
    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Attach a completed listing to a directory entry
    ///
    /// Returns false if the directory is no longer cached.
    pub fn set_listing(
        &mut self,
        dir: &VirtualPath,
        children: Vec<VirtualPath>,
        root_state: RootState,
    ) -> bool {
        match self.entries.get_mut(dir) {
            Some(entry) => {
                entry.children = Some(children);
                entry.root_state = root_state;
                true
            }
            None => false,
        }
    }

    /// Drop `root` and every cached path below it, returning how many went
    pub fn remove_subtree(&mut self, root: &VirtualPath) -> usize {
        let doomed: Vec<VirtualPath> = self
            .entries
            .range(root.clone()..)
            .take_while(|(path, _)| path.starts_with(root))
            .map(|(path, _)| path.clone())
            .collect();

        for path in &doomed {
            self.entries.remove(path);
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
