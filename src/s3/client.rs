use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::storage::{ByteStream, StorageError, StorageResult};

/// Wrapper around AWS S3 client
pub struct S3Client {
    client: Client,
    region: String,
}

impl S3Client {
    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, region: String) -> Self {
        S3Client { client, region }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// List objects under a prefix, following continuation tokens to the end
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<ListObjectsResult> {
        let mut result = ListObjectsResult::default();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket);

            if !prefix.is_empty() {
                req = req.prefix(prefix);
            }

            if let Some(delim) = delimiter {
                req = req.delimiter(delim);
            }

            let resp = req
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| backend_error(format!("failed to list s3://{}/{}", bucket, prefix), e))?;
            pages += 1;

            result.prefixes.extend(
                resp.common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix())
                    .map(String::from),
            );

            result.objects.extend(resp.contents().iter().map(|obj| ObjectInfo {
                key: obj.key().unwrap_or("").to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
                last_modified: obj.last_modified().and_then(to_chrono),
            }));

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(
            bucket,
            prefix,
            pages,
            objects = result.objects.len(),
            prefixes = result.prefixes.len(),
            "listed objects"
        );
        Ok(result)
    }

    /// Get an object's metadata, or `None` if no object has this key
    pub async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectMetadata>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(resp) => Ok(Some(ObjectMetadata {
                size: resp.content_length().unwrap_or(0).max(0) as u64,
                last_modified: resp.last_modified().and_then(to_chrono),
            })),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_not_found() {
                    Ok(None)
                } else {
                    Err(backend_error(
                        format!("failed to get metadata for s3://{}/{}", bucket, key),
                        service,
                    ))
                }
            }
        }
    }

    /// Stream an object's contents
    pub async fn get_object_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    return Err(StorageError::NotFound(format!("s3://{}/{}", bucket, key)));
                }
                return Err(backend_error(
                    format!("failed to get object s3://{}/{}", bucket, key),
                    service,
                ));
            }
        };

        let reader = resp.body.into_async_read();
        Ok(Box::pin(ReaderStream::new(reader)))
    }
}

fn backend_error<E: std::error::Error>(context: String, err: E) -> StorageError {
    StorageError::Backend(format!("{}: {}", context, DisplayErrorContext(&err)))
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Result of listing objects in a bucket
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResult {
    pub prefixes: Vec<String>,
    pub objects: Vec<ObjectInfo>,
}

impl ListObjectsResult {
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Information about an S3 object
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Metadata about an S3 object
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}
