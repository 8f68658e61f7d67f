use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gallery_atoms::store::dynamo;
use ingest_block::orchestrator::{DEFAULT_BRAND, DEFAULT_CONCURRENCY};
use ingest_block::reconcile::DEFAULT_ORPHAN_TTL;
use ingest_block::validate::Limits;
use ingest_block::IngestSettings;
use thiserror::Error;

/// Files per batch that still fit one 100-item transaction: the event row,
/// two image rows per file (each with its order claim) and the intent update.
pub const MAX_FILES_PER_TRANSACTION: usize =
    (dynamo::MAX_TRANSACTION_ITEMS - 2) / (2 * dynamo::ITEMS_PER_IMAGE);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is not valid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub table_name: String,
    pub bucket_name: String,
    pub asset_base_url: String,
    pub watermark_brand: String,
    pub ingest_concurrency: usize,
    pub max_file_bytes: usize,
    pub max_batch_files: usize,
    pub font_dir: Option<PathBuf>,
    pub orphan_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let table_name = get("TABLE_NAME").unwrap_or_else(|| "gallery".to_string());
        let bucket_name = get("S3_BUCKET_NAME").unwrap_or_else(|| "gallery-assets".to_string());
        let asset_base_url = get("ASSET_BASE_URL")
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket_name));

        let ingest_concurrency = parse(&get, "INGEST_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        if ingest_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "INGEST_CONCURRENCY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let limits = Limits::default();
        let max_file_bytes = parse(&get, "MAX_FILE_BYTES", limits.max_file_bytes)?;
        let mut max_batch_files = parse(&get, "MAX_BATCH_FILES", limits.max_batch_files)?;
        if max_batch_files > MAX_FILES_PER_TRANSACTION {
            tracing::warn!(
                requested = max_batch_files,
                cap = MAX_FILES_PER_TRANSACTION,
                "MAX_BATCH_FILES exceeds what one transaction can hold; capping"
            );
            max_batch_files = MAX_FILES_PER_TRANSACTION;
        }

        let orphan_ttl = Duration::from_secs(parse(&get, "ORPHAN_TTL_SECS", DEFAULT_ORPHAN_TTL.as_secs())?);

        Ok(Self {
            table_name,
            bucket_name,
            asset_base_url,
            watermark_brand: get("WATERMARK_BRAND").unwrap_or_else(|| DEFAULT_BRAND.to_string()),
            ingest_concurrency,
            max_file_bytes,
            max_batch_files,
            font_dir: get("FONT_DIR").map(PathBuf::from),
            orphan_ttl,
        })
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            brand: self.watermark_brand.clone(),
            concurrency: self.ingest_concurrency,
            limits: Limits {
                max_file_bytes: self.max_file_bytes,
                max_batch_files: self.max_batch_files,
            },
        }
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
