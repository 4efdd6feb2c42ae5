//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vaultsh::storage::{
    ByteStream, FileInfo, MemoryBackend, StorageBackend, StorageResult, bytes_stream,
    collect_bytes,
};
use vaultsh::volume::{
    DEFAULT_MARKER_FILE, FileHandle, UnlockError, Volume, VolumeEngine, VolumeError,
    VolumeFile, VolumeHandle, VolumeResult,
};
use vaultsh::{PathRouter, VirtualPath};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts calls per path on top of a [`MemoryBackend`]
#[derive(Clone, Default)]
pub struct CountingBackend {
    pub memory: MemoryBackend,
    calls: Arc<Mutex<HashMap<(&'static str, String), usize>>>,
    delay: Option<Duration>,
}

impl CountingBackend {
    pub fn new(memory: MemoryBackend) -> Self {
        Self {
            memory,
            ..Self::default()
        }
    }

    /// Every metadata and listing call sleeps first, so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn count(&self, op: &'static str, path: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&(op, path.to_string())).copied().unwrap_or(0)
    }

    pub fn total(&self, op: &'static str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls
            .iter()
            .filter(|((name, _), _)| *name == op)
            .map(|(_, n)| n)
            .sum()
    }

    async fn record(&self, op: &'static str, path: &VirtualPath) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry((op, path.to_string()))
            .or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl StorageBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    async fn get_info(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        self.record("get_info", path).await;
        self.memory.get_info(path).await
    }

    async fn list(&self, dir: &VirtualPath) -> StorageResult<Vec<FileInfo>> {
        self.record("list", dir).await;
        self.memory.list(dir).await
    }

    async fn open_read(&self, path: &VirtualPath) -> StorageResult<ByteStream> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(("open_read", path.to_string()))
            .or_default() += 1;
        self.memory.open_read(path).await
    }
}

/// Ciphertext name used by [`FakeEngine`] for a plaintext file name
pub fn encrypt_name(name: &str) -> String {
    format!("{}.enc", name.chars().rev().collect::<String>())
}

fn decrypt_name(name: &str) -> Option<String> {
    name.strip_suffix(".enc")
        .map(|stem| stem.chars().rev().collect())
}

/// Ciphertext body used by [`FakeEngine`] for plaintext contents
pub fn encrypt_body(plain: &str) -> String {
    plain.chars().rev().collect()
}

/// Volume engine that "encrypts" file names and bodies by reversing them
///
/// Directory names are stored as-is. A volume root holds the marker file,
/// whose contents are the password. Every read records `password:path` in
/// the shared read log, so tests can tell which volume served it.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub reads: Arc<Mutex<Vec<String>>>,
    pub unlocks: Arc<Mutex<usize>>,
}

impl FakeEngine {
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn unlock_count(&self) -> usize {
        *self.unlocks.lock().unwrap()
    }
}

#[async_trait]
impl VolumeEngine for FakeEngine {
    async fn unlock(
        &self,
        storage: Arc<dyn StorageBackend>,
        password: &str,
    ) -> Result<VolumeHandle, UnlockError> {
        *self.unlocks.lock().unwrap() += 1;

        let marker = VirtualPath::root().join(DEFAULT_MARKER_FILE);
        let stream = storage.open_read(&marker).await.map_err(|e| {
            if e.is_not_found() {
                UnlockError::CorruptHeader("missing volume config".to_string())
            } else {
                UnlockError::Storage(e)
            }
        })?;
        let config = collect_bytes(stream)
            .await
            .map_err(|e| UnlockError::Storage(e.into()))?;

        if config != Bytes::from(password.to_string()) {
            return Err(UnlockError::InvalidPassword);
        }

        Ok(Arc::new(FakeVolume {
            storage,
            label: password.to_string(),
            reads: Arc::clone(&self.reads),
        }))
    }
}

struct FakeVolume {
    storage: Arc<dyn StorageBackend>,
    label: String,
    reads: Arc<Mutex<Vec<String>>>,
}

impl FakeVolume {
    fn file(&self, plain: VirtualPath, info: &FileInfo) -> FileHandle {
        Arc::new(FakeFile {
            plain,
            encrypted: info.path.to_string(),
            raw: info.path.clone(),
            is_dir: info.is_directory,
            size: info.size,
            modified: info.last_modified,
            storage: Arc::clone(&self.storage),
            label: self.label.clone(),
            reads: Arc::clone(&self.reads),
        })
    }
}

#[async_trait]
impl Volume for FakeVolume {
    async fn get_file(&self, path: &VirtualPath) -> VolumeResult<FileHandle> {
        let Some(name) = path.name() else {
            let info = self.storage.get_info(path).await?;
            return Ok(self.file(path.clone(), &info));
        };
        let parent = path.parent().unwrap_or_else(VirtualPath::root);

        let raw_file = parent.join(&encrypt_name(name));
        if let Ok(info) = self.storage.get_info(&raw_file).await {
            if !info.is_directory {
                return Ok(self.file(path.clone(), &info));
            }
        }

        match self.storage.get_info(path).await {
            Ok(info) if info.is_directory || (name == DEFAULT_MARKER_FILE && !parent.is_root()) => {
                Ok(self.file(path.clone(), &info))
            }
            _ => Err(VolumeError::NotFound(path.to_string())),
        }
    }

    async fn list_files(&self, dir: &VirtualPath) -> VolumeResult<Vec<FileHandle>> {
        let mut files = Vec::new();
        for info in self.storage.list(dir).await? {
            let name = info.name().to_string();
            let plain = if info.is_directory {
                Some(name)
            } else if name == DEFAULT_MARKER_FILE {
                // a nested volume's marker; our own stays hidden
                (!dir.is_root()).then_some(name)
            } else {
                decrypt_name(&name)
            };
            if let Some(plain) = plain {
                files.push(self.file(dir.join(&plain), &info));
            }
        }
        Ok(files)
    }
}

struct FakeFile {
    plain: VirtualPath,
    encrypted: String,
    raw: VirtualPath,
    is_dir: bool,
    size: u64,
    modified: Option<DateTime<Utc>>,
    storage: Arc<dyn StorageBackend>,
    label: String,
    reads: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for FakeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeFile")
            .field("plain", &self.plain)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

#[async_trait]
impl VolumeFile for FakeFile {
    fn path(&self) -> &VirtualPath {
        &self.plain
    }

    fn name(&self) -> &str {
        self.plain.name().unwrap_or("/")
    }

    fn is_directory(&self) -> bool {
        self.is_dir
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn length(&self) -> u64 {
        self.size
    }

    fn encrypted_path(&self) -> &str {
        &self.encrypted
    }

    async fn open_read(&self) -> VolumeResult<ByteStream> {
        if self.is_dir {
            return Err(VolumeError::IsADirectory(self.plain.to_string()));
        }
        self.reads
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.label, self.plain));

        let raw = collect_bytes(self.storage.open_read(&self.raw).await?)
            .await
            .map_err(|e| VolumeError::Corrupt(e.to_string()))?;
        let plain: Vec<u8> = raw.iter().rev().copied().collect();
        Ok(bytes_stream(Bytes::from(plain)))
    }
}

/// Backend with a plain area, one encrypted volume at `/docs` (password
/// `secret`) and its look-alike sibling `/docs2`
pub fn sample_backend() -> CountingBackend {
    let memory = MemoryBackend::new();
    memory.insert_file("/readme.txt", "plain text");
    memory.insert_file("/docs/.encfs6.xml", "secret");
    memory.insert_file(
        format!("/docs/{}", encrypt_name("notes.txt")).as_str(),
        encrypt_body("hello from the vault"),
    );
    memory.insert_file(
        format!("/docs/projects/{}", encrypt_name("plan.md")).as_str(),
        encrypt_body("# plan"),
    );
    memory.insert_file("/docs2/other.txt", "not encrypted");
    CountingBackend::new(memory)
}

pub fn router_over(backend: &CountingBackend, engine: &FakeEngine) -> PathRouter {
    PathRouter::new(Arc::new(backend.clone()), Arc::new(engine.clone()))
}

pub async fn read_to_string(router: &PathRouter, path: &str) -> String {
    let stream = router.open_read(&VirtualPath::parse(path)).await.unwrap();
    let bytes = collect_bytes(stream).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
