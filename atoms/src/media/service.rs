use super::model::{sort_images, Image, ImagePatch, ImageVariant};
use crate::error::ServiceError;
use crate::store::MetadataStore;

/// Load all images for an event, ordered by `order` with ORIGINAL before WATERMARK.
pub async fn load_images_for_event(
    store: &dyn MetadataStore,
    event_id: &str,
) -> Result<Vec<Image>, ServiceError> {
    let mut images = store.list_images(event_id).await?;
    sort_images(&mut images);
    Ok(images)
}

/// Next free ORIGINAL `order` in an event (0 for an event without images).
pub async fn next_order(store: &dyn MetadataStore, event_id: &str) -> Result<u32, ServiceError> {
    let images = store.list_images(event_id).await?;
    Ok(images
        .iter()
        .filter(|image| image.variant == ImageVariant::Original)
        .map(|image| image.order + 1)
        .max()
        .unwrap_or(0))
}

/// Get a specific image
pub async fn get_image(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
) -> Result<Image, ServiceError> {
    store
        .get_image(event_id, image_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Image {} not found", image_id)))
}

/// Update an image.
///
/// A patch on a WATERMARK row is applied to its paired ORIGINAL as well, in the
/// same write. An `order` change on an ORIGINAL moves the WATERMARK rows that
/// reference it; its description stays local.
pub async fn update_image(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
    patch: ImagePatch,
) -> Result<Image, ServiceError> {
    let image = get_image(store, event_id, image_id).await?;
    if patch.is_empty() {
        return Ok(image);
    }

    let mut targets = vec![image];
    if let Some(original) = paired_original(store, &targets[0]).await? {
        targets.push(original);
    }

    let mut followers = Vec::new();
    if let Some(order) = patch.order {
        let siblings = store.list_images(event_id).await?;
        if targets[0].variant == ImageVariant::Original {
            followers = siblings
                .iter()
                .filter(|row| {
                    row.variant == ImageVariant::Watermark
                        && row.original_id.as_deref() == Some(targets[0].image_id.as_str())
                })
                .cloned()
                .collect();
        }

        let moving: Vec<&Image> = targets.iter().chain(&followers).collect();
        for target in &moving {
            let taken = siblings.iter().any(|row| {
                row.variant == target.variant
                    && row.order == order
                    && !moving.iter().any(|m| m.image_id == row.image_id)
            });
            if taken {
                return Err(ServiceError::InvalidInput(format!(
                    "{} order {} is already used in event {}",
                    target.variant.as_str(),
                    order,
                    event_id
                )));
            }
        }

        for follower in &mut followers {
            follower.order = order;
        }
    }

    for target in &mut targets {
        patch.apply_to(target);
    }
    targets.extend(followers);
    store.put_images(&targets).await?;

    tracing::info!(
        event_id,
        image_id,
        propagated = targets.len() > 1,
        "image updated"
    );
    Ok(targets.swap_remove(0))
}

/// Delete an image.
///
/// Deleting a WATERMARK also deletes the ORIGINAL it references. Deleting an
/// ORIGINAL removes only that row; WATERMARK rows pointing at it are left as they are.
/// Returns the identifiers that were removed.
pub async fn delete_image(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let image = get_image(store, event_id, image_id).await?;

    let mut doomed = vec![image.image_id.clone()];
    if let Some(original) = paired_original(store, &image).await? {
        doomed.push(original.image_id);
    }

    store.delete_images(event_id, &doomed).await?;
    tracing::info!(event_id, image_id, removed = doomed.len(), "image deleted");
    Ok(doomed)
}

async fn paired_original(
    store: &dyn MetadataStore,
    image: &Image,
) -> Result<Option<Image>, ServiceError> {
    let original_id = match (image.variant, image.original_id.as_deref()) {
        (ImageVariant::Watermark, Some(id)) => id,
        _ => return Ok(None),
    };

    let original = store.get_image(&image.event_id, original_id).await?;
    if original.is_none() {
        tracing::warn!(
            event_id = %image.event_id,
            image_id = %image.image_id,
            original_id,
            "watermark references a missing original"
        );
    }
    Ok(original)
}
