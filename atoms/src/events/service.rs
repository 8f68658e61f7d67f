use chrono::Utc;

use super::model::{Event, EventPatch, EventWithImages};
use crate::error::ServiceError;
use crate::media::service::load_images_for_event;
use crate::store::MetadataStore;

pub async fn get_event(store: &dyn MetadataStore, event_id: &str) -> Result<Event, ServiceError> {
    store
        .get_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Event {} not found", event_id)))
}

/// Event plus its images (Backend Join)
pub async fn get_event_with_images(
    store: &dyn MetadataStore,
    event_id: &str,
) -> Result<EventWithImages, ServiceError> {
    let (event, images) = tokio::join!(
        get_event(store, event_id),
        load_images_for_event(store, event_id)
    );
    Ok(EventWithImages {
        event: event?,
        images: images?,
    })
}

/// Apply a partial update to an event's scalar fields.
pub async fn update_event(
    store: &dyn MetadataStore,
    event_id: &str,
    patch: EventPatch,
) -> Result<Event, ServiceError> {
    for (field, value) in [
        ("title", &patch.title),
        ("location", &patch.location),
        ("category", &patch.category),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            return Err(ServiceError::InvalidInput(format!("{} must not be empty", field)));
        }
    }

    let mut event = get_event(store, event_id).await?;
    if patch.is_empty() {
        return Ok(event);
    }

    patch.apply_to(&mut event, Utc::now());
    store.put_event(&event).await?;
    tracing::info!(event_id, "event updated");
    Ok(event)
}

/// Delete an event together with every image row it owns.
pub async fn delete_event(store: &dyn MetadataStore, event_id: &str) -> Result<(), ServiceError> {
    get_event(store, event_id).await?;
    store.delete_event(event_id).await?;
    tracing::info!(event_id, "event deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::NewEvent;
    use crate::media::model::{ImageVariant, NewImage};
    use crate::patch::Field;
    use crate::store::MemoryStore;

    async fn seeded(store: &MemoryStore, files: u32) -> Event {
        let mut tx = store.begin().await.unwrap();
        let event = tx
            .create_event(NewEvent {
                title: "Regatta".into(),
                description: Some("Boats".into()),
                date: Utc::now(),
                location: "Harbour".into(),
                category: "sport".into(),
                user_id: "3".into(),
            })
            .await
            .unwrap();
        for order in (0..files).rev() {
            let original = tx
                .create_image(NewImage {
                    event_id: event.event_id.clone(),
                    url: format!("https://cdn.test/o/{}", order),
                    variant: ImageVariant::Original,
                    order,
                    description: None,
                    original_id: None,
                })
                .await
                .unwrap();
            tx.create_image(NewImage {
                event_id: event.event_id.clone(),
                url: format!("https://cdn.test/w/{}", order),
                variant: ImageVariant::Watermark,
                order,
                description: None,
                original_id: Some(original.image_id),
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();
        event
    }

    #[tokio::test]
    async fn event_comes_back_with_sorted_images() {
        let store = MemoryStore::new();
        let event = seeded(&store, 3).await;

        let full = get_event_with_images(&store, &event.event_id).await.unwrap();
        let layout: Vec<_> = full.images.iter().map(|i| (i.order, i.variant)).collect();
        assert_eq!(
            layout,
            vec![
                (0, ImageVariant::Original),
                (0, ImageVariant::Watermark),
                (1, ImageVariant::Original),
                (1, ImageVariant::Watermark),
                (2, ImageVariant::Original),
                (2, ImageVariant::Watermark),
            ]
        );
    }

    #[tokio::test]
    async fn patch_clears_description_and_keeps_other_fields() {
        let store = MemoryStore::new();
        let event = seeded(&store, 0).await;

        let patch = EventPatch {
            description: Field::Null,
            location: Some("Pier 4".into()),
            ..Default::default()
        };
        let updated = update_event(&store, &event.event_id, patch).await.unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.location, "Pier 4");
        assert_eq!(updated.title, "Regatta");
        assert!(updated.updated_at >= event.updated_at);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let store = MemoryStore::new();
        let event = seeded(&store, 0).await;

        let patch = EventPatch {
            title: Some("   ".into()),
            ..Default::default()
        };
        let err = update_event(&store, &event.event_id, patch).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[tokio::test]
    async fn delete_removes_owned_images() {
        let store = MemoryStore::new();
        let event = seeded(&store, 2).await;
        assert_eq!(store.image_count(), 4);

        delete_event(&store, &event.event_id).await.unwrap();
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.image_count(), 0);

        let err = get_event(&store, &event.event_id).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
