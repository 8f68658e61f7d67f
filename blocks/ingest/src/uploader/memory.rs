use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{join_url, AssetReaper, AssetUploader, Destination, UploadError, UploadedAsset};

const BASE_URL: &str = "memory://assets";

#[derive(Debug, Default)]
struct Bucket {
    objects: BTreeMap<String, Vec<u8>>,
    fail_category: Option<String>,
    delay_order: Option<(u32, Duration)>,
}

/// In-process asset store for tests. Clones share the same bucket.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    bucket: Arc<Mutex<Bucket>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reject uploads whose category contains `needle`.
    pub fn fail_category(&self, needle: impl Into<String>) {
        self.lock().fail_category = Some(needle.into());
    }

    /// Hold uploads for `order` back by `delay`, to shuffle completion order.
    pub fn delay_order(&self, order: u32, delay: Duration) {
        self.lock().delay_order = Some((order, delay));
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    /// Resolve a URL handed out by this store back to its bytes.
    pub fn get_url(&self, url: &str) -> Option<Vec<u8>> {
        let key = url.strip_prefix(BASE_URL)?.trim_start_matches('/');
        self.get(key)
    }
}

#[async_trait]
impl AssetUploader for MemoryAssets {
    async fn upload(&self, bytes: Vec<u8>, dest: &Destination) -> Result<UploadedAsset, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::EmptyBuffer {
                category: dest.category.clone(),
            });
        }

        let key = dest.key_for(&bytes);
        let delay = {
            let bucket = self.lock();
            if let Some(needle) = &bucket.fail_category {
                if dest.category.contains(needle.as_str()) {
                    return Err(UploadError::Rejected {
                        key,
                        reason: "injected failure".into(),
                    });
                }
            }
            bucket
                .delay_order
                .filter(|(order, _)| *order == dest.order)
                .map(|(_, d)| d)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.lock().objects.insert(key.clone(), bytes);
        Ok(UploadedAsset {
            url: join_url(BASE_URL, &key),
            key,
        })
    }
}

#[async_trait]
impl AssetReaper for MemoryAssets {
    async fn purge_prefix(&self, prefix: &str) -> Result<usize, UploadError> {
        let mut bucket = self.lock();
        let before = bucket.objects.len();
        bucket.objects.retain(|key, _| !key.starts_with(prefix));
        Ok(before - bucket.objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_buffer_is_rejected_before_storing() {
        let assets = MemoryAssets::new();
        let err = assets
            .upload(Vec::new(), &Destination::new("events/b/originals", 0))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(assets.object_count(), 0);
    }

    #[tokio::test]
    async fn purge_only_touches_prefix() {
        let assets = MemoryAssets::new();
        assets.upload(vec![1], &Destination::new("events/a/originals", 0)).await.unwrap();
        assets.upload(vec![2], &Destination::new("events/a/watermarks", 0)).await.unwrap();
        assets.upload(vec![3], &Destination::new("events/b/originals", 0)).await.unwrap();

        assert_eq!(assets.purge_prefix("events/a/").await.unwrap(), 2);
        assert_eq!(assets.object_count(), 1);
    }

    #[tokio::test]
    async fn urls_resolve_back_to_bytes() {
        let assets = MemoryAssets::new();
        let uploaded = assets
            .upload(vec![9, 9], &Destination::new("events/c/originals", 1))
            .await
            .unwrap();
        assert_eq!(assets.get_url(&uploaded.url), Some(vec![9, 9]));
    }
}
