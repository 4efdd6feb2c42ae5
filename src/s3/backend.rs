use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::S3Client;
use crate::storage::{ByteStream, FileInfo, StorageBackend, StorageError, StorageResult};
use crate::vfs::VirtualPath;

/// Which bucket (and key prefix) an [`S3Backend`] exposes as `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3BackendConfig {
    pub bucket: String,
    /// Key prefix without surrounding slashes; empty for the whole bucket
    pub prefix: String,
}

impl S3BackendConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_matches('/').to_string();
        self
    }

    /// Object key for a path; the root maps to the prefix itself
    pub fn key_for(&self, path: &VirtualPath) -> String {
        let relative = path.segments().join("/");
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative,
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, relative),
        }
    }

    /// Listing prefix for the children of a directory path
    pub fn dir_prefix(&self, path: &VirtualPath) -> String {
        let key = self.key_for(path);
        if key.is_empty() { key } else { format!("{}/", key) }
    }

    /// Path for an object key or common prefix, if it lies under the configured prefix
    pub fn path_for_key(&self, key: &str) -> Option<VirtualPath> {
        let key = key.trim_end_matches('/');
        let relative = if self.prefix.is_empty() {
            key
        } else if key == self.prefix {
            ""
        } else {
            key.strip_prefix(&self.prefix)?.strip_prefix('/')?
        };
        Some(VirtualPath::parse(relative))
    }
}

/// Read-only storage over one S3 bucket, treating `/` in keys as directories
pub struct S3Backend {
    client: Arc<S3Client>,
    config: S3BackendConfig,
}

impl S3Backend {
    pub fn new(client: Arc<S3Client>, config: S3BackendConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &S3BackendConfig {
        &self.config
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        "s3"
    }

    async fn get_info(&self, path: &VirtualPath) -> StorageResult<FileInfo> {
        if path.is_root() {
            return Ok(FileInfo::directory(path.clone()));
        }

        let key = self.config.key_for(path);
        if let Some(meta) = self.client.head_object(&self.config.bucket, &key).await? {
            let info = FileInfo::file(path.clone(), meta.size);
            return Ok(match meta.last_modified {
                Some(modified) => info.with_modified(modified),
                None => info,
            });
        }

        // No object with this key; it is a directory if anything lives below it
        let prefix = self.config.dir_prefix(path);
        let listing = self
            .client
            .list_objects(&self.config.bucket, &prefix, Some("/"))
            .await?;
        if listing.is_empty() {
            return Err(StorageError::not_found(path));
        }
        Ok(FileInfo::directory(path.clone()))
    }

    async fn list(&self, dir: &VirtualPath) -> StorageResult<Vec<FileInfo>> {
        let prefix = self.config.dir_prefix(dir);
        let listing = self
            .client
            .list_objects(&self.config.bucket, &prefix, Some("/"))
            .await?;

        if listing.is_empty() && !dir.is_root() {
            // Distinguish a missing directory from a key that names an object
            let info = self.get_info(dir).await?;
            if !info.is_directory {
                return Err(StorageError::NotADirectory(dir.to_string()));
            }
        }

        let mut infos: Vec<FileInfo> = Vec::new();
        for common in &listing.prefixes {
            if let Some(path) = self.config.path_for_key(common) {
                infos.push(FileInfo::directory(path));
            }
        }
        for object in &listing.objects {
            // Folder placeholder objects ("dir/") describe the directory itself
            if object.key == prefix || object.key.ends_with('/') {
                continue;
            }
            if let Some(path) = self.config.path_for_key(&object.key) {
                let info = FileInfo::file(path, object.size);
                infos.push(match object.last_modified {
                    Some(modified) => info.with_modified(modified),
                    None => info,
                });
            }
        }
        infos.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(%dir, count = infos.len(), "listed s3 directory");
        Ok(infos)
    }

    async fn open_read(&self, path: &VirtualPath) -> StorageResult<ByteStream> {
        if path.is_root() {
            return Err(StorageError::IsADirectory(path.to_string()));
        }
        let key = self.config.key_for(path);
        self.client
            .get_object_stream(&self.config.bucket, &key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => StorageError::not_found(path),
                other => other,
            })
    }
}
