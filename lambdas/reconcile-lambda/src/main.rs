use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use gallery_atoms::store::DynamoStore;
use gallery_shared::AppConfig;
use ingest_block::S3Assets;
use lambda_runtime::{run, service_fn, tracing, Error};

mod handler;
use handler::{function_handler, Sweeper};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = AppConfig::from_env()?;
    let aws = aws_config::load_from_env().await;
    let sweeper = Arc::new(Sweeper {
        store: Arc::new(DynamoStore::new(DynamoClient::new(&aws), &config.table_name)),
        reaper: Arc::new(S3Assets::new(
            S3Client::new(&aws),
            &config.bucket_name,
            &config.asset_base_url,
        )),
        ttl: config.orphan_ttl,
    });

    run(service_fn(move |event| {
        let sweeper = sweeper.clone();
        async move { function_handler(event, sweeper).await }
    }))
    .await
}
