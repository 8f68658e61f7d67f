pub mod config;

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use gallery_atoms::store::DynamoStore;
use gallery_atoms::MetadataStore;
use ingest_block::{Ingestor, S3Assets, Transcoder};

pub use config::{AppConfig, ConfigError};

/// Everything a handler needs, built once per cold start and shared by `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn MetadataStore>,
    pub ingestor: Ingestor,
}

impl AppState {
    /// AWS clients from the default credential chain.
    pub async fn from_env(config: AppConfig) -> Self {
        let aws = aws_config::load_from_env().await;
        Self::with_clients(config, DynamoClient::new(&aws), S3Client::new(&aws))
    }

    pub fn with_clients(config: AppConfig, dynamo: DynamoClient, s3: S3Client) -> Self {
        let store: Arc<dyn MetadataStore> = Arc::new(DynamoStore::new(dynamo, &config.table_name));
        let assets = Arc::new(S3Assets::new(s3, &config.bucket_name, &config.asset_base_url));
        let transcoder = Transcoder::new(config.font_dir.as_deref());
        let ingestor = Ingestor::new(store.clone(), assets, transcoder, config.ingest_settings());

        tracing::info!(
            table = %config.table_name,
            bucket = %config.bucket_name,
            concurrency = config.ingest_concurrency,
            "application state ready"
        );

        Self {
            config,
            store,
            ingestor,
        }
    }
}
