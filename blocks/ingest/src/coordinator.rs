//! Metadata Transaction Coordinator.
//!
//! Writes an event and its ORIGINAL/WATERMARK pairs in one store transaction.
//! Rows are staged in ascending `order`, each ORIGINAL before the WATERMARK that
//! references it, and the batch's upload intent is fulfilled in the same commit.

use gallery_atoms::events::{Event, EventWithImages, NewEvent};
use gallery_atoms::media::{Image, ImageVariant, NewImage};
use gallery_atoms::{MetadataStore, MetadataTransaction, StoreError};

use crate::error::IngestError;

/// Uploaded renditions of one file, keyed by its batch position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub order: u32,
    pub original_url: String,
    pub watermark_url: String,
    pub description: Option<String>,
}

/// Create the event and all image rows, then commit. Nothing is visible unless
/// every row is accepted.
pub async fn commit_batch(
    store: &dyn MetadataStore,
    new_event: NewEvent,
    results: &[FileResult],
    batch_id: &str,
) -> Result<EventWithImages, IngestError> {
    let mut sorted: Vec<&FileResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.order);

    let mut tx = store.begin().await.map_err(|e| persistence(None, e))?;

    let staged = async {
        let event = tx.create_event(new_event).await.map_err(|e| persistence(None, e))?;
        let images = stage_pairs(tx.as_mut(), &event.event_id, &sorted).await?;
        tx.fulfil_intent(batch_id, &event.event_id)
            .await
            .map_err(|e| persistence(None, e))?;
        Ok::<_, IngestError>((event, images))
    }
    .await;

    let (event, images) = match staged {
        Ok(staged) => staged,
        Err(e) => {
            tx.rollback().await;
            return Err(e);
        }
    };

    // Staging order: event, then two rows per file, then the intent.
    tx.commit().await.map_err(|e| {
        let index = e
            .position()
            .filter(|p| *p >= 1)
            .and_then(|p| sorted.get((p - 1) / 2))
            .map(|r| r.order as usize);
        persistence(index, e)
    })?;

    tracing::info!(
        event_id = %event.event_id,
        batch_id,
        files = sorted.len(),
        "event and images committed"
    );
    Ok(EventWithImages { event, images })
}

/// Append one ORIGINAL/WATERMARK pair to an existing event.
pub async fn append_to_event(
    store: &dyn MetadataStore,
    event: &Event,
    result: &FileResult,
    batch_id: &str,
) -> Result<Vec<Image>, IngestError> {
    let mut tx = store.begin().await.map_err(|e| persistence(None, e))?;

    let staged = async {
        let images = stage_pairs(tx.as_mut(), &event.event_id, &[result]).await?;
        tx.fulfil_intent(batch_id, &event.event_id)
            .await
            .map_err(|e| persistence(None, e))?;
        Ok::<_, IngestError>(images)
    }
    .await;

    let images = match staged {
        Ok(images) => images,
        Err(e) => {
            tx.rollback().await;
            return Err(e);
        }
    };

    tx.commit().await.map_err(|e| persistence(Some(0), e))?;
    tracing::info!(event_id = %event.event_id, order = result.order, "image pair appended");
    Ok(images)
}

async fn stage_pairs(
    tx: &mut dyn MetadataTransaction,
    event_id: &str,
    results: &[&FileResult],
) -> Result<Vec<Image>, IngestError> {
    let mut images = Vec::with_capacity(results.len() * 2);
    for result in results {
        let index = Some(result.order as usize);

        let original = tx
            .create_image(NewImage {
                event_id: event_id.to_string(),
                url: result.original_url.clone(),
                variant: ImageVariant::Original,
                order: result.order,
                description: result.description.clone(),
                original_id: None,
            })
            .await
            .map_err(|e| persistence(index, e))?;

        let watermark = tx
            .create_image(NewImage {
                event_id: event_id.to_string(),
                url: result.watermark_url.clone(),
                variant: ImageVariant::Watermark,
                order: result.order,
                description: result.description.clone(),
                original_id: Some(original.image_id.clone()),
            })
            .await
            .map_err(|e| persistence(index, e))?;

        images.push(original);
        images.push(watermark);
    }
    Ok(images)
}

fn persistence(index: Option<usize>, source: StoreError) -> IngestError {
    tracing::error!(?index, error = %source, "metadata transaction failed");
    IngestError::Persistence { index, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gallery_atoms::intents::UploadIntent;
    use gallery_atoms::store::MemoryStore;

    fn new_event() -> NewEvent {
        NewEvent {
            title: "Concert".into(),
            description: None,
            date: Utc::now(),
            location: "Hall".into(),
            category: "music".into(),
            user_id: "5".into(),
        }
    }

    fn result(order: u32) -> FileResult {
        FileResult {
            order,
            original_url: format!("https://cdn.test/o/{}", order),
            watermark_url: format!("https://cdn.test/w/{}", order),
            description: None,
        }
    }

    async fn store_with_intent(batch_id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .record_intent(&UploadIntent::pending(batch_id, format!("events/{}/", batch_id)))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn rows_are_written_in_ascending_order_with_links() {
        let store = store_with_intent("b1").await;
        let results = vec![result(2), result(0), result(1)];

        let created = commit_batch(&store, new_event(), &results, "b1").await.unwrap();
        let orders: Vec<_> = created.images.iter().map(|i| (i.order, i.variant)).collect();
        assert_eq!(orders[0], (0, ImageVariant::Original));
        assert_eq!(orders[1], (0, ImageVariant::Watermark));
        assert_eq!(orders[5], (2, ImageVariant::Watermark));
        for pair in created.images.chunks(2) {
            assert_eq!(pair[1].original_id.as_deref(), Some(pair[0].image_id.as_str()));
        }
        assert!(!store.intent("b1").unwrap().is_pending());
    }

    #[tokio::test]
    async fn staging_failure_rolls_back_and_names_the_file() {
        let store = store_with_intent("b2").await;
        store.reject_image_order(1);

        let err = commit_batch(&store, new_event(), &[result(0), result(1)], "b2")
            .await
            .unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.image_count(), 0);
        assert!(store.intent("b2").unwrap().is_pending());
    }

    #[tokio::test]
    async fn commit_abort_leaves_nothing() {
        let store = store_with_intent("b3").await;
        store.abort_next_commit();

        let err = commit_batch(&store, new_event(), &[result(0)], "b3").await.unwrap_err();
        assert!(matches!(err, IngestError::Persistence { .. }));
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn unknown_intent_fails_the_whole_commit() {
        let store = MemoryStore::new();
        let err = commit_batch(&store, new_event(), &[result(0)], "never-recorded")
            .await
            .unwrap_err();
        assert_eq!(err.index(), None);
        assert_eq!(store.image_count(), 0);
    }
}
