//! Orphan reconciliation sweep.
//!
//! Intents still pending after `ttl` belong to requests that uploaded objects but
//! never committed. Their prefixes are purged and the intent is dropped. A failed
//! purge keeps the intent so the next sweep retries it.

use std::time::Duration;

use chrono::Utc;
use gallery_atoms::{MetadataStore, StoreError};
use serde::Serialize;

use crate::uploader::AssetReaper;

pub const DEFAULT_ORPHAN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Intents whose prefix was purged and record removed.
    pub swept: usize,
    pub objects_deleted: usize,
    /// Intents left in place for the next sweep.
    pub failures: usize,
}

pub async fn reconcile_orphans(
    store: &dyn MetadataStore,
    reaper: &dyn AssetReaper,
    ttl: Duration,
) -> Result<ReconcileReport, StoreError> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
    let cutoff = Utc::now() - ttl;
    let stale = store.pending_intents(cutoff).await?;
    tracing::info!(count = stale.len(), %cutoff, "reconciling stale upload intents");

    let mut report = ReconcileReport::default();
    for intent in stale {
        let deleted = match reaper.purge_prefix(&intent.prefix).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(batch_id = %intent.batch_id, prefix = %intent.prefix, error = %e, "purge failed");
                report.failures += 1;
                continue;
            }
        };

        if let Err(e) = store.delete_intent(&intent.batch_id).await {
            tracing::error!(batch_id = %intent.batch_id, error = %e, "intent delete failed");
            report.failures += 1;
            report.objects_deleted += deleted;
            continue;
        }

        tracing::info!(batch_id = %intent.batch_id, prefix = %intent.prefix, deleted, "orphans removed");
        report.swept += 1;
        report.objects_deleted += deleted;
    }

    Ok(report)
}
