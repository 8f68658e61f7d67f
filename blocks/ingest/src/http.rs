use gallery_atoms::respond;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::IngestError;
use crate::orchestrator::Ingestor;
use crate::validate::{validate_batch, validate_file, CreateEventRequest, FilePayload};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    stage: crate::error::Stage,
    index: Option<usize>,
    message: String,
}

pub fn ingest_error(e: &IngestError) -> Result<Response<Body>, Error> {
    respond::json(
        e.status(),
        &ErrorBody {
            error: e.kind(),
            stage: e.stage(),
            index: e.index(),
            message: e.to_string(),
        },
    )
}

/// HTTP Handler: POST /events
pub async fn create_event_handler(
    ingestor: &Ingestor,
    user_id: Option<&str>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!(size = body.len(), "create_event_handler");

    let req: CreateEventRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => return ingest_error(&IngestError::invalid(None, e.to_string())),
    };

    let batch = match validate_batch(req, user_id.unwrap_or_default(), ingestor.settings().limits) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!(error = %e, "batch rejected before processing");
            return ingest_error(&e);
        }
    };

    match ingestor.ingest_batch(batch).await {
        Ok(created) => {
            tracing::info!(
                event_id = %created.event.event_id,
                images = created.images.len(),
                "create_event_handler success"
            );
            respond::json(
                StatusCode::CREATED,
                &serde_json::json!({
                    "event_id": created.event.event_id,
                    "message": "Event created successfully",
                    "event": created,
                }),
            )
        }
        Err(e) => ingest_error(&e),
    }
}

/// HTTP Handler: POST /events/{event_id}/images
pub async fn upload_image_handler(
    ingestor: &Ingestor,
    event_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: FilePayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return ingest_error(&IngestError::invalid(None, e.to_string())),
    };

    let file = match validate_file(0, payload, ingestor.settings().limits) {
        Ok(file) => file,
        Err(e) => return ingest_error(&e),
    };

    match ingestor.ingest_single(event_id, file).await {
        Ok(images) => respond::json(StatusCode::CREATED, &images),
        Err(e) => ingest_error(&e),
    }
}
