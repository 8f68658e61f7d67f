use std::sync::Arc;
use std::time::Duration;

use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use gallery_atoms::MetadataStore;
use ingest_block::{reconcile_orphans, AssetReaper, ReconcileReport};
use lambda_runtime::{Error, LambdaEvent};

pub(crate) struct Sweeper {
    pub store: Arc<dyn MetadataStore>,
    pub reaper: Arc<dyn AssetReaper>,
    pub ttl: Duration,
}

/// Scheduled sweep: purge remote objects of upload intents that never committed.
pub(crate) async fn function_handler(
    event: LambdaEvent<CloudWatchEvent>,
    sweeper: Arc<Sweeper>,
) -> Result<ReconcileReport, Error> {
    tracing::info!(
        request_id = %event.context.request_id,
        source = ?event.payload.source,
        ttl_secs = sweeper.ttl.as_secs(),
        "orphan reconciliation triggered"
    );

    let report = reconcile_orphans(sweeper.store.as_ref(), sweeper.reaper.as_ref(), sweeper.ttl).await?;

    if report.failures > 0 {
        tracing::warn!(?report, "reconciliation finished with failures; they will be retried");
    } else {
        tracing::info!(?report, "reconciliation finished");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gallery_atoms::intents::UploadIntent;
    use gallery_atoms::store::MemoryStore;
    use ingest_block::uploader::{AssetUploader, Destination};
    use ingest_block::MemoryAssets;
    use lambda_runtime::Context;

    fn scheduled_event() -> LambdaEvent<CloudWatchEvent> {
        let payload: CloudWatchEvent = serde_json::from_value(serde_json::json!({
            "version": "0",
            "id": "5f2a1c1e-0000-0000-0000-000000000000",
            "detail-type": "Scheduled Event",
            "source": "aws.events",
            "account": "123456789012",
            "time": "2025-01-01T00:00:00Z",
            "region": "ap-southeast-2",
            "resources": [],
            "detail": {}
        }))
        .unwrap();
        LambdaEvent::new(payload, Context::default())
    }

    #[tokio::test]
    async fn sweeps_stale_intents() {
        let store = MemoryStore::new();
        let assets = MemoryAssets::new();
        store
            .record_intent(&UploadIntent::pending("b1", "events/b1/"))
            .await
            .unwrap();
        store.backdate_intent("b1", Utc::now() - chrono::Duration::hours(2));
        assets
            .upload(vec![1], &Destination::new("events/b1/originals", 0))
            .await
            .unwrap();

        let sweeper = Arc::new(Sweeper {
            store: Arc::new(store.clone()),
            reaper: Arc::new(assets.clone()),
            ttl: Duration::from_secs(3600),
        });

        let report = function_handler(scheduled_event(), sweeper).await.unwrap();
        assert_eq!(report.swept, 1);
        assert_eq!(report.objects_deleted, 1);
        assert_eq!(assets.object_count(), 0);
        assert!(store.intent("b1").is_none());
    }
}
