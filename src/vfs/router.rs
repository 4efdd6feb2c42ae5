//! Path cache and router.
//!
//! Every plaintext path is served either by the storage backend or, when it
//! lies under the mount root of an unlocked volume, by that volume. Metadata
//! and listings are cached per path until an unlock at or above the path
//! invalidates them.
//!
//! Locks are never held across an await. When both are needed the in-flight
//! map is taken before the tables.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

use super::inflight::{InflightMap, SharedCall};
use super::registry::{EncryptedPathRef, VolumeRegistry};
use super::{CacheEntry, RootState, VirtualPath};
use crate::cache::{FileHandleCache, MetadataCache};
use crate::error::{VaultError, VaultResult};
use crate::storage::{ByteStream, ScopedBackend, StorageBackend};
use crate::volume::{FileHandle, VolumeEngine, VolumeHandle};

/// Router over one storage backend and one volume engine
///
/// Cheap to clone; clones share all cached state.
#[derive(Clone)]
pub struct PathRouter {
    state: Arc<RouterState>,
}

struct RouterState {
    storage: Arc<dyn StorageBackend>,
    engine: Arc<dyn VolumeEngine>,
    tables: RwLock<Tables>,
    inflight: Mutex<Inflight>,
}

#[derive(Default)]
struct Tables {
    metadata: MetadataCache,
    handles: FileHandleCache,
    volumes: VolumeRegistry,
    /// Bumped by every unlock; results fetched under an older value are not cached
    generation: u64,
}

#[derive(Default)]
struct Inflight {
    resolve: InflightMap<CacheEntry>,
    list: InflightMap<Vec<VirtualPath>>,
}

enum Route {
    Backend,
    Volume {
        target: EncryptedPathRef,
        volume: VolumeHandle,
    },
}

#[derive(Default)]
struct Listing {
    entries: Vec<(CacheEntry, Option<FileHandle>)>,
    marker_seen: bool,
}

impl PathRouter {
    pub fn new(storage: Arc<dyn StorageBackend>, engine: Arc<dyn VolumeEngine>) -> Self {
        PathRouter {
            state: Arc::new(RouterState {
                storage,
                engine,
                tables: RwLock::new(Tables::default()),
                inflight: Mutex::new(Inflight::default()),
            }),
        }
    }

    /// Metadata for `path`, fetched on a cache miss
    #[instrument(skip_all, fields(path = %path))]
    pub async fn resolve(&self, path: &VirtualPath) -> VaultResult<CacheEntry> {
        if let Some(entry) = self.cached(path) {
            debug!("cache hit");
            return Ok(entry);
        }
        self.join_resolve(path).await
    }

    /// Children of a directory, in delegate order
    ///
    /// Listings are cached until an unlock invalidates them, so repeated calls
    /// reach the delegate once.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn list(&self, path: &VirtualPath) -> VaultResult<Vec<VirtualPath>> {
        let entry = self.resolve(path).await?;
        if !entry.is_directory {
            return Err(VaultError::NotADirectory(path.clone()));
        }
        if let Some(children) = entry.children {
            debug!(count = children.len(), "listing served from cache");
            return Ok(children);
        }
        self.join_list(path).await
    }

    /// Unlock the volume rooted at `root`
    ///
    /// On failure nothing changes. On success every cached entry below
    /// `root` is dropped before the volume becomes visible, so the next
    /// listing goes through the volume. The root's own metadata survives
    /// without its listing.
    #[instrument(skip_all, fields(root = %root))]
    pub async fn unlock(&self, root: &VirtualPath, password: &str) -> VaultResult<()> {
        if self.is_volume_unlocked(root) {
            debug!("volume already unlocked");
            return Ok(());
        }

        let scoped: Arc<dyn StorageBackend> =
            Arc::new(ScopedBackend::new(root.clone(), Arc::clone(&self.state.storage)));
        let volume = self
            .state
            .engine
            .unlock(scoped, password)
            .await
            .map_err(|source| {
                warn!(error = %source, "unlock failed");
                VaultError::UnlockFailed {
                    root: root.clone(),
                    source,
                }
            })?;

        self.install_volume(root, volume);
        Ok(())
    }

    /// Open a file for reading
    #[instrument(skip_all, fields(path = %path))]
    pub async fn open_read(&self, path: &VirtualPath) -> VaultResult<ByteStream> {
        let entry = self.resolve(path).await?;
        if entry.is_directory {
            return Err(VaultError::IsADirectory(path.clone()));
        }

        let (route, _) = self.route(path)?;
        match route {
            Route::Backend => self
                .state
                .storage
                .open_read(path)
                .await
                .map_err(|e| VaultError::from_storage(path, e)),
            Route::Volume { target, volume } => {
                let cached = self.read_tables().handles.get(path);
                let opened = match cached {
                    Some(handle) => {
                        debug!("reading through cached file handle");
                        handle.open_read().await
                    }
                    None => volume.open_read(&target.remaining).await,
                };
                opened.map_err(|e| VaultError::from_volume(path, e))
            }
        }
    }

    /// Plaintext path for a ciphertext path, if some cached handle matches
    ///
    /// A handle matches when its volume-internal ciphertext path is a suffix
    /// of `ciphertext`. Only paths already resolved inside an unlocked volume
    /// can be found, and volumes sharing a suffix are not told apart.
    pub fn reverse_decrypt(&self, ciphertext: &str) -> Option<VirtualPath> {
        self.read_tables().handles.find_by_encrypted_suffix(ciphertext)
    }

    /// Cached entry for `path`, without fetching
    pub fn cached(&self, path: &VirtualPath) -> Option<CacheEntry> {
        self.read_tables().metadata.get(path).cloned()
    }

    fn entry(&self, path: &VirtualPath) -> VaultResult<CacheEntry> {
        self.cached(path)
            .ok_or_else(|| VaultError::NotFound(path.clone()))
    }

    pub fn name(&self, path: &VirtualPath) -> VaultResult<String> {
        let entry = self.entry(path)?;
        Ok(entry.path.name().unwrap_or("/").to_string())
    }

    pub fn size(&self, path: &VirtualPath) -> VaultResult<u64> {
        Ok(self.entry(path)?.size)
    }

    pub fn last_modified(&self, path: &VirtualPath) -> VaultResult<Option<DateTime<Utc>>> {
        Ok(self.entry(path)?.last_modified)
    }

    pub fn is_directory(&self, path: &VirtualPath) -> VaultResult<bool> {
        Ok(self.entry(path)?.is_directory)
    }

    /// `None` until the directory has been listed
    pub fn is_encrypted_root(&self, path: &VirtualPath) -> VaultResult<Option<bool>> {
        Ok(self.entry(path)?.is_encrypted_root())
    }

    pub fn is_volume_unlocked(&self, root: &VirtualPath) -> bool {
        self.read_tables().volumes.contains(root)
    }

    /// Parent of a resolved path; the root is its own parent
    pub fn parent_path(&self, path: &VirtualPath) -> VaultResult<VirtualPath> {
        let entry = self.entry(path)?;
        Ok(entry.path.parent().unwrap_or_else(VirtualPath::root))
    }

    /// Mount roots of the unlocked volumes
    pub fn unlocked_roots(&self) -> Vec<VirtualPath> {
        self.read_tables().volumes.roots()
    }

    /// Drop every cached entry and unlocked volume, then disconnect the backend
    pub async fn disconnect(&self) {
        self.reset();
        self.state.storage.disconnect().await;
        info!("router disconnected");
    }

    fn join_resolve(&self, path: &VirtualPath) -> SharedCall<CacheEntry> {
        let mut inflight = self.lock_inflight();
        if let Some(call) = inflight.resolve.get(path) {
            debug!("joining in-flight resolve");
            return call;
        }
        if let Some(entry) = self.cached(path) {
            return async move { Ok::<_, VaultError>(entry) }.boxed().shared();
        }

        let id = inflight.resolve.reserve_id();
        let router = self.clone();
        let target = path.clone();
        let call = async move {
            let result = router.fetch_entry(&target).await;
            router.lock_inflight().resolve.finish(&target, id);
            result
        }
        .boxed()
        .shared();
        inflight.resolve.insert(path.clone(), id, call.clone());
        call
    }

    fn join_list(&self, path: &VirtualPath) -> SharedCall<Vec<VirtualPath>> {
        let mut inflight = self.lock_inflight();
        if let Some(call) = inflight.list.get(path) {
            debug!("joining in-flight listing");
            return call;
        }
        if let Some(children) = self.cached(path).and_then(|entry| entry.children) {
            return async move { Ok::<_, VaultError>(children) }.boxed().shared();
        }

        let id = inflight.list.reserve_id();
        let router = self.clone();
        let target = path.clone();
        let call = async move {
            let result = router.fetch_listing(&target).await;
            router.lock_inflight().list.finish(&target, id);
            result
        }
        .boxed()
        .shared();
        inflight.list.insert(path.clone(), id, call.clone());
        call
    }

    async fn fetch_entry(&self, path: &VirtualPath) -> VaultResult<CacheEntry> {
        let (route, generation) = self.route(path)?;
        let (entry, handle) = match route {
            Route::Backend => {
                debug!(%path, "resolving through storage backend");
                let info = self
                    .state
                    .storage
                    .get_info(path)
                    .await
                    .map_err(|e| VaultError::from_storage(path, e))?;
                (CacheEntry::from_file_info(path.clone(), &info), None)
            }
            Route::Volume { target, volume } => {
                debug!(%target, "resolving through volume");
                let file = volume
                    .get_file(&target.remaining)
                    .await
                    .map_err(|e| VaultError::from_volume(path, e))?;
                (CacheEntry::from_volume_file(path.clone(), file.as_ref()), Some(file))
            }
        };
        Ok(self.commit_entry(generation, entry, handle))
    }

    async fn fetch_listing(&self, dir: &VirtualPath) -> VaultResult<Vec<VirtualPath>> {
        let (route, generation) = self.route(dir)?;
        let marker = self.state.engine.marker_file_name();
        let mut listing = Listing::default();

        match route {
            Route::Backend => {
                debug!(%dir, "listing through storage backend");
                let infos = self
                    .state
                    .storage
                    .list(dir)
                    .await
                    .map_err(|e| VaultError::from_storage(dir, e))?;
                for info in &infos {
                    listing.marker_seen |= info.name() == marker;
                    listing
                        .entries
                        .push((CacheEntry::from_file_info(info.path.clone(), info), None));
                }
            }
            Route::Volume { target, volume } => {
                debug!(%target, "listing through volume");
                let files = volume
                    .list_files(&target.remaining)
                    .await
                    .map_err(|e| VaultError::from_volume(dir, e))?;
                for file in files {
                    let full = target.root.concat(file.path());
                    listing.marker_seen |= file.name() == marker;
                    let entry = CacheEntry::from_volume_file(full, file.as_ref());
                    listing.entries.push((entry, Some(file)));
                }
            }
        }

        Ok(self.commit_listing(dir, generation, listing))
    }

    fn route(&self, path: &VirtualPath) -> VaultResult<(Route, u64)> {
        let tables = self.read_tables();
        let generation = tables.generation;
        let Some(target) = tables.volumes.route(path) else {
            return Ok((Route::Backend, generation));
        };
        match tables.volumes.get(&target.root) {
            Some(volume) => Ok((Route::Volume { target, volume }, generation)),
            None => {
                error!(root = %target.root, "registry matched a root with no volume");
                Err(VaultError::InvalidEncryptedPath(target.root))
            }
        }
    }

    fn commit_entry(
        &self,
        generation: u64,
        entry: CacheEntry,
        handle: Option<FileHandle>,
    ) -> CacheEntry {
        let mut tables = self.write_tables();
        if tables.generation != generation {
            warn!(path = %entry.path, "discarding metadata fetched before an unlock");
            return entry;
        }

        if let Some(handle) = handle {
            tables.handles.insert(entry.path.clone(), handle);
        }
        let path = entry.path.clone();
        tables.metadata.upsert(entry.clone());
        tables.metadata.get(&path).cloned().unwrap_or(entry)
    }

    fn commit_listing(&self, dir: &VirtualPath, generation: u64, listing: Listing) -> Vec<VirtualPath> {
        let children: Vec<VirtualPath> = listing
            .entries
            .iter()
            .map(|(entry, _)| entry.path.clone())
            .collect();
        let root_state = RootState::from_marker_seen(listing.marker_seen);

        let mut tables = self.write_tables();
        if tables.generation != generation {
            warn!(%dir, "discarding listing fetched before an unlock");
            return children;
        }

        for (entry, handle) in listing.entries {
            if let Some(handle) = handle {
                tables.handles.insert(entry.path.clone(), handle);
            }
            tables.metadata.upsert(entry);
        }
        if !tables.metadata.set_listing(dir, children.clone(), root_state) {
            debug!(%dir, "directory left the cache before its listing landed");
        }
        debug!(%dir, count = children.len(), ?root_state, "listing cached");
        children
    }

    fn install_volume(&self, root: &VirtualPath, volume: VolumeHandle) {
        let mut inflight = self.lock_inflight();
        let mut tables = self.write_tables();
        if tables.volumes.contains(root) {
            debug!(%root, "volume was unlocked concurrently");
            return;
        }

        tables.generation += 1;
        let preserved = tables.metadata.get(root).cloned().map(|mut entry| {
            entry.children = None;
            entry
        });
        let purged = tables.metadata.remove_subtree(root);
        let handles = tables.handles.remove_subtree(root);
        if let Some(entry) = preserved {
            tables.metadata.insert(entry);
        }
        tables.volumes.register(root.clone(), volume);
        inflight.resolve.detach_subtree(root);
        inflight.list.detach_subtree(root);

        info!(%root, purged, handles, "volume unlocked");
    }

    fn reset(&self) {
        let mut inflight = self.lock_inflight();
        let mut tables = self.write_tables();
        inflight.resolve.clear();
        inflight.list.clear();
        tables.metadata.clear();
        tables.handles.clear();
        tables.volumes.clear();
        tables.generation += 1;
    }

    fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.state.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.state.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_inflight(&self) -> MutexGuard<'_, Inflight> {
        self.state.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
