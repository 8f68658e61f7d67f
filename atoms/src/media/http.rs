use lambda_http::{http::StatusCode, Body, Error, Response};

use super::model::ImagePatch;
use super::service::{delete_image, get_image, update_image};
use crate::respond;
use crate::store::MetadataStore;

/// HTTP Handler: GET /events/{event_id}/images/{image_id}
pub async fn get_image_handler(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
) -> Result<Response<Body>, Error> {
    match get_image(store, event_id, image_id).await {
        Ok(image) => respond::json(StatusCode::OK, &image),
        Err(e) => respond::service_error(&e),
    }
}

/// HTTP Handler: PATCH /events/{event_id}/images/{image_id}
pub async fn update_image_handler(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let patch: ImagePatch = match serde_json::from_slice(body) {
        Ok(patch) => patch,
        Err(e) => return respond::error(StatusCode::BAD_REQUEST, "InvalidInput", e.to_string()),
    };

    match update_image(store, event_id, image_id, patch).await {
        Ok(image) => respond::json(StatusCode::OK, &image),
        Err(e) => {
            tracing::error!(event_id, image_id, error = %e, "update_image failed");
            respond::service_error(&e)
        }
    }
}

/// HTTP Handler: DELETE /events/{event_id}/images/{image_id}
pub async fn delete_image_handler(
    store: &dyn MetadataStore,
    event_id: &str,
    image_id: &str,
) -> Result<Response<Body>, Error> {
    match delete_image(store, event_id, image_id).await {
        Ok(_) => respond::no_content(),
        Err(e) => {
            tracing::error!(event_id, image_id, error = %e, "delete_image failed");
            respond::service_error(&e)
        }
    }
}
