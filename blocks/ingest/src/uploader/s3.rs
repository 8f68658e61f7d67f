use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;

use super::{join_url, AssetReaper, AssetUploader, Destination, UploadError, UploadedAsset};

/// S3-backed asset store. Public URLs are `{base_url}/{key}`.
#[derive(Debug, Clone)]
pub struct S3Assets {
    client: S3Client,
    bucket: String,
    base_url: String,
}

impl S3Assets {
    pub fn new(client: S3Client, bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AssetUploader for S3Assets {
    async fn upload(&self, bytes: Vec<u8>, dest: &Destination) -> Result<UploadedAsset, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::EmptyBuffer {
                category: dest.category.clone(),
            });
        }

        let key = dest.key_for(&bytes);
        let size = bytes.len();
        let resp = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("image/jpeg")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %self.bucket, key = %key, error = %e, "S3 put_object failed");
                UploadError::Rejected {
                    key: key.clone(),
                    reason: e.to_string(),
                }
            })?;

        match resp.e_tag() {
            Some(etag) if !etag.trim_matches('"').is_empty() => {}
            _ => return Err(UploadError::Unacknowledged { key }),
        }

        tracing::debug!(key = %key, size, "asset uploaded");
        Ok(UploadedAsset {
            url: join_url(&self.base_url, &key),
            key,
        })
    }
}

#[async_trait]
impl AssetReaper for S3Assets {
    async fn purge_prefix(&self, prefix: &str) -> Result<usize, UploadError> {
        let purge_err = |reason: String| UploadError::Purge {
            prefix: prefix.to_string(),
            reason,
        };

        let mut deleted = 0;
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = continuation.as_ref() {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| {
                tracing::error!(prefix, error = %e, "S3 list_objects_v2 failed");
                purge_err(e.to_string())
            })?;

            let objects: Vec<_> = resp
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .filter_map(|k| ObjectIdentifier::builder().key(k).build().ok())
                .collect();

            if !objects.is_empty() {
                let count = objects.len();
                let payload = Delete::builder()
                    .set_objects(Some(objects))
                    .build()
                    .map_err(|e| purge_err(format!("failed to build delete payload: {:?}", e)))?;

                let out = self
                    .client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(payload)
                    .send()
                    .await
                    .map_err(|e| purge_err(e.to_string()))?;

                let failed = out.errors().len();
                if failed > 0 {
                    return Err(purge_err(format!("{} objects could not be deleted", failed)));
                }
                deleted += count;
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(deleted)
    }
}
