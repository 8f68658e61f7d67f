use lambda_http::{http::StatusCode, Body, Error, Response};

use super::model::EventPatch;
use super::service;
use crate::respond;
use crate::store::MetadataStore;

/// HTTP Handler: GET /events/{event_id}
pub async fn get_event_handler(store: &dyn MetadataStore, event_id: &str) -> Result<Response<Body>, Error> {
    match service::get_event_with_images(store, event_id).await {
        Ok(event) => respond::json(StatusCode::OK, &event),
        Err(e) => respond::service_error(&e),
    }
}

/// HTTP Handler: PATCH /events/{event_id}
pub async fn update_event_handler(
    store: &dyn MetadataStore,
    event_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let patch: EventPatch = match serde_json::from_slice(body) {
        Ok(patch) => patch,
        Err(e) => return respond::error(StatusCode::BAD_REQUEST, "InvalidInput", e.to_string()),
    };

    match service::update_event(store, event_id, patch).await {
        Ok(event) => respond::json(StatusCode::OK, &event),
        Err(e) => {
            tracing::error!(event_id, error = %e, "update_event failed");
            respond::service_error(&e)
        }
    }
}

/// HTTP Handler: DELETE /events/{event_id}
pub async fn delete_event_handler(store: &dyn MetadataStore, event_id: &str) -> Result<Response<Body>, Error> {
    match service::delete_event(store, event_id).await {
        Ok(()) => respond::no_content(),
        Err(e) => {
            tracing::error!(event_id, error = %e, "delete_event failed");
            respond::service_error(&e)
        }
    }
}
