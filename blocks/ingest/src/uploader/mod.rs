//! Remote asset store capability.
//!
//! [`AssetUploader`] is all ingestion needs: push a buffer, get back a durable URL.
//! [`AssetReaper`] is used only by orphan reconciliation.
//! No retries happen at this layer; callers decide.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use memory::MemoryAssets;
pub use s3::S3Assets;

const DIGEST_PREFIX_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("refusing to upload an empty buffer to {category}")]
    EmptyBuffer { category: String },

    #[error("remote store rejected {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("remote store did not acknowledge {key}")]
    Unacknowledged { key: String },

    #[error("listing or deleting under {prefix} failed: {reason}")]
    Purge { prefix: String, reason: String },
}

impl UploadError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, UploadError::EmptyBuffer { .. })
    }
}

/// Where an upload lands: a logical folder plus the file's batch position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// e.g. `events/{batch_id}/originals`
    pub category: String,
    pub order: u32,
}

impl Destination {
    pub fn new(category: impl Into<String>, order: u32) -> Self {
        Self {
            category: category.into(),
            order,
        }
    }

    /// Object key: `{category}/{order}-{sha256 prefix}.jpg`.
    pub fn key_for(&self, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        format!(
            "{}/{}-{}.jpg",
            self.category.trim_end_matches('/'),
            self.order,
            &hex[..DIGEST_PREFIX_LEN]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, dest: &Destination) -> Result<UploadedAsset, UploadError>;
}

#[async_trait]
pub trait AssetReaper: Send + Sync {
    /// Delete every object under `prefix`; returns how many were removed.
    async fn purge_prefix(&self, prefix: &str) -> Result<usize, UploadError>;
}

pub(crate) fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}
