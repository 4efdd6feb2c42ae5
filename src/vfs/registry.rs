use std::collections::BTreeMap;
use std::fmt;

use super::VirtualPath;
use crate::volume::VolumeHandle;

/// A path matched against an unlocked volume's mount root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPathRef {
    /// Mount root of the matching volume
    pub root: VirtualPath,
    /// `full` relative to `root`; the volume root itself is `/`
    pub remaining: VirtualPath,
    pub full: VirtualPath,
}

impl fmt::Display for EncryptedPathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in volume {})", self.remaining, self.root)
    }
}

/// Unlocked volumes keyed by mount root
///
/// Volumes may nest; [`VolumeRegistry::route`] picks the deepest root that
/// contains the queried path.
#[derive(Default)]
pub struct VolumeRegistry {
    volumes: BTreeMap<VirtualPath, VolumeHandle>,
}

impl VolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a volume, replacing any previous one at the same root
    pub fn register(&mut self, root: VirtualPath, volume: VolumeHandle) {
        self.volumes.insert(root, volume);
    }

    pub fn get(&self, root: &VirtualPath) -> Option<VolumeHandle> {
        self.volumes.get(root).cloned()
    }

    pub fn contains(&self, root: &VirtualPath) -> bool {
        self.volumes.contains_key(root)
    }

    /// Registered mount roots in path order
    pub fn roots(&self) -> Vec<VirtualPath> {
        self.volumes.keys().cloned().collect()
    }

    /// Longest-prefix match of `path` against the registered roots
    pub fn route(&self, path: &VirtualPath) -> Option<EncryptedPathRef> {
        let mut best: Option<&VirtualPath> = None;

        for root in self.volumes.keys() {
            if !path.starts_with(root) {
                continue;
            }
            match best {
                Some(current) if current.depth() >= root.depth() => {}
                _ => best = Some(root),
            }
        }

        let root = best?;
        let remaining = path.strip_prefix(root)?;
        Some(EncryptedPathRef {
            root: root.clone(),
            remaining,
            full: path.clone(),
        })
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}
