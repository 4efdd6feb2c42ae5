//! In-memory storage backend.
//!
//! Holds a tree of directories and byte files. Used by tests and by
//! embedders that want a scratch store; all data is lost when dropped.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

use super::{
    bytes_stream, ByteSink, ByteStream, FileInfo, StorageBackend, StorageError, StorageResult,
};
use crate::vfs::VirtualPath;

#[derive(Debug, Clone)]
enum Node {
    File { data: Bytes, modified: DateTime<Utc> },
    Directory { modified: DateTime<Utc> },
}

impl Node {
    fn info(&self, path: &VirtualPath) -> FileInfo {
        match self {
            Node::File { data, modified } => FileInfo::file(path.clone(), data.len() as u64)
                .with_modified(*modified)
                .with_writable(true),
            Node::Directory { modified } => FileInfo::directory(path.clone())
                .with_modified(*modified)
                .with_writable(true),
        }
    }
}

type Tree = BTreeMap<VirtualPath, Node>;

/// In-memory filesystem.
///
/// Thread-safe via an internal `RwLock`; listings are ordered by name.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<RwLock<Tree>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new filesystem containing only the root directory
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            VirtualPath::root(),
            Node::Directory {
                modified: Utc::now(),
            },
        );
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Store a file, creating missing parent directories
    pub fn insert_file(&self, path: impl Into<VirtualPath>, data: impl Into<Bytes>) {
        let path = path.into();
        let mut entries = write_tree(&self.entries);
        if let Some(parent) = path.parent() {
            create_parents(&mut entries, &parent);
        }
        entries.insert(
            path,
            Node::File {
                data: data.into(),
                modified: Utc::now(),
            },
        );
    }

    /// Create a directory and any missing parents
    pub fn insert_dir(&self, path: impl Into<VirtualPath>) {
        let path = path.into();
        let mut entries = write_tree(&self.entries);
        create_parents(&mut entries, &path);
    }

    /// Raw contents of a file, if present
    pub fn file_contents(&self, path: &VirtualPath) -> Option<Bytes> {
        match read_tree(&self.entries).get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    fn require_directory(entries: &Tree, path: &VirtualPath) -> StorageResult<()> {
        match entries.get(path) {
            Some(Node::Directory { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(StorageError::NotADirectory(path.to_string())),
            None => Err(StorageError::not_found(path)),
        }
    }

    fn require_parent(entries: &Tree, path: &VirtualPath) -> StorageResult<()> {
        match path.parent() {
            Some(parent) => Self::require_directory(entries, &parent),
            None => Err(StorageError::InvalidPath(path.to_string())),
        }
    }
}

fn read_tree(entries: &RwLock<Tree>) -> std::sync::RwLockReadGuard<'_, Tree> {
    entries.read().unwrap_or_else(|e| e.into_inner())
}

fn write_tree(entries: &RwLock<Tree>) -> std::sync::RwLockWriteGuard<'_, Tree> {
    entries.write().unwrap_or_else(|e| e.into_inner())
}

fn create_parents(entries: &mut Tree, path: &VirtualPath) {
    let mut current = VirtualPath::root();
    for segment in path.segments() {
        current = current.join(segment);
        entries.entry(current.clone()).or_insert(Node::Directory {
            modified: Utc::now(),
        });
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_info(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        read_tree(&self.entries)
            .get(path)
            .map(|node| node.info(path))
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn list(&self, dir: &VirtualPath) -> StorageResult<Vec<FileInfo>> {
        let entries = read_tree(&self.entries);
        Self::require_directory(&entries, dir)?;

        Ok(entries
            .iter()
            .filter(|(path, _)| path.parent().as_ref() == Some(dir))
            .map(|(path, node)| node.info(path))
            .collect())
    }

    async fn open_read(&self, path: &VirtualPath) -> StorageResult<ByteStream> {
        match read_tree(&self.entries).get(path) {
            Some(Node::File { data, .. }) => Ok(bytes_stream(data.clone())),
            Some(Node::Directory { .. }) => Err(StorageError::IsADirectory(path.to_string())),
            None => Err(StorageError::not_found(path)),
        }
    }

    async fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> StorageResult<()> {
        let mut entries = write_tree(&self.entries);
        if !entries.contains_key(from) {
            return Err(StorageError::not_found(from));
        }
        if entries.contains_key(to) {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        if from.is_root() || to.starts_with(from) {
            return Err(StorageError::InvalidPath(to.to_string()));
        }
        Self::require_parent(&entries, to)?;

        let moved: Vec<VirtualPath> = entries
            .keys()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(node), Some(rest)) = (entries.remove(&old), old.strip_prefix(from)) {
                entries.insert(to.concat(&rest), node);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &VirtualPath) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let mut entries = write_tree(&self.entries);
        if !entries.contains_key(path) {
            return Err(StorageError::not_found(path));
        }
        entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn mkdir(&self, path: &VirtualPath) -> StorageResult<()> {
        let mut entries = write_tree(&self.entries);
        if entries.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        Self::require_parent(&entries, path)?;
        entries.insert(
            path.clone(),
            Node::Directory {
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mkdirs(&self, path: &VirtualPath) -> StorageResult<()> {
        let mut entries = write_tree(&self.entries);
        let mut current = VirtualPath::root();
        for segment in path.segments() {
            current = current.join(segment);
            if let Some(Node::File { .. }) = entries.get(&current) {
                return Err(StorageError::NotADirectory(current.to_string()));
            }
        }
        create_parents(&mut entries, path);
        Ok(())
    }

    async fn create_file(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        let mut entries = write_tree(&self.entries);
        if entries.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        Self::require_parent(&entries, path)?;
        let node = Node::File {
            data: Bytes::new(),
            modified: Utc::now(),
        };
        let info = node.info(path);
        entries.insert(path.clone(), node);
        Ok(info)
    }

    async fn copy(&self, from: &VirtualPath, to: &VirtualPath) -> StorageResult<()> {
        let mut entries = write_tree(&self.entries);
        let data = match entries.get(from) {
            Some(Node::File { data, .. }) => data.clone(),
            Some(Node::Directory { .. }) => {
                return Err(StorageError::IsADirectory(from.to_string()));
            }
            None => return Err(StorageError::not_found(from)),
        };
        if matches!(entries.get(to), Some(Node::Directory { .. })) {
            return Err(StorageError::IsADirectory(to.to_string()));
        }
        Self::require_parent(&entries, to)?;
        entries.insert(
            to.clone(),
            Node::File {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn open_write(&self, path: &VirtualPath, length: u64) -> StorageResult<ByteSink> {
        {
            let entries = read_tree(&self.entries);
            if let Some(Node::Directory { .. }) = entries.get(path) {
                return Err(StorageError::IsADirectory(path.to_string()));
            }
            Self::require_parent(&entries, path)?;
        }
        Ok(Box::pin(MemoryWriter {
            entries: Arc::clone(&self.entries),
            path: path.clone(),
            buffer: Vec::with_capacity(usize::try_from(length).unwrap_or(0)),
        }))
    }
}

/// Buffers writes and stores the file when shut down
struct MemoryWriter {
    entries: Arc<RwLock<Tree>>,
    path: VirtualPath,
    buffer: Vec<u8>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let data = Bytes::from(std::mem::take(&mut this.buffer));
        write_tree(&this.entries).insert(
            this.path.clone(),
            Node::File {
                data,
                modified: Utc::now(),
            },
        );
        Poll::Ready(Ok(()))
    }
}
