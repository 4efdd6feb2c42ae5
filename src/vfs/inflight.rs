use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;

use super::VirtualPath;
use crate::error::VaultResult;

/// A delegate call that every caller asking for the same path can await
pub(crate) type SharedCall<T> = Shared<BoxFuture<'static, VaultResult<T>>>;

/// Delegate calls currently running, one per path
///
/// Each call is tagged with an id so that a call finishing late cannot remove
/// a newer call that replaced it for the same path.
pub(crate) struct InflightMap<T: Clone> {
    next_id: u64,
    calls: HashMap<VirtualPath, (u64, SharedCall<T>)>,
}

impl<T: Clone> Default for InflightMap<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            calls: HashMap::new(),
        }
    }
}

impl<T: Clone> InflightMap<T> {
    pub fn get(&self, path: &VirtualPath) -> Option<SharedCall<T>> {
        self.calls.get(path).map(|(_, call)| call.clone())
    }

    pub fn reserve_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert(&mut self, path: VirtualPath, id: u64, call: SharedCall<T>) {
        self.calls.insert(path, (id, call));
    }

    /// Forget the call for `path` if it is still the one tagged `id`
    pub fn finish(&mut self, path: &VirtualPath, id: u64) {
        if self.calls.get(path).is_some_and(|(current, _)| *current == id) {
            self.calls.remove(path);
        }
    }

    /// Detach every call at or below `root`; running calls still complete
    pub fn detach_subtree(&mut self, root: &VirtualPath) {
        self.calls.retain(|path, _| !path.starts_with(root));
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.calls.len()
    }
}
