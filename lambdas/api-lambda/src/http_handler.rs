use std::sync::Arc;

use gallery_atoms::{events, media, respond};
use gallery_shared::AppState;
use ingest_block::http as ingest;
use lambda_http::http::header::HeaderValue;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};

const USER_HEADER: &str = "X-User-Id";

fn with_cors_headers(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,X-User-Id"),
    );
    resp
}

/// Main Lambda handler - routes `/events...` requests
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!(%method, path, "api lambda invoked");

    // Handle CORS preflight
    if method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp));
    }

    let user_id = event
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok());
    let store = state.store.as_ref();

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let resp = match (method, parts.as_slice()) {
        // --- EVENTS ---
        // POST /events - create event from a batch of files
        (&Method::POST, ["events"]) => ingest::create_event_handler(&state.ingestor, user_id, body).await,
        // GET /events/{id} - event with ordered images
        (&Method::GET, ["events", event_id]) => events::get_event_handler(store, event_id).await,
        // PATCH /events/{id}
        (&Method::PATCH, ["events", event_id]) => events::update_event_handler(store, event_id, body).await,
        // DELETE /events/{id} - event and all its images
        (&Method::DELETE, ["events", event_id]) => events::delete_event_handler(store, event_id).await,

        // --- EVENT IMAGES ---
        // POST /events/{id}/images - append one file
        (&Method::POST, ["events", event_id, "images"]) => {
            ingest::upload_image_handler(&state.ingestor, event_id, body).await
        }
        // GET /events/{id}/images/{iid}
        (&Method::GET, ["events", event_id, "images", image_id]) => {
            media::get_image_handler(store, event_id, image_id).await
        }
        // PATCH /events/{id}/images/{iid} - propagates to the paired original
        (&Method::PATCH, ["events", event_id, "images", image_id]) => {
            media::update_image_handler(store, event_id, image_id, body).await
        }
        // DELETE /events/{id}/images/{iid} - watermark deletes cascade to the original
        (&Method::DELETE, ["events", event_id, "images", image_id]) => {
            media::delete_image_handler(store, event_id, image_id).await
        }

        (_, ["events", ..]) => respond::error(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Method not allowed"),
        _ => respond::not_found(),
    };

    resp.map(with_cors_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_atoms::store::MemoryStore;
    use gallery_shared::AppConfig;
    use ingest_block::{Ingestor, MemoryAssets, Transcoder};

    fn state() -> (Arc<AppState>, MemoryStore) {
        let store = MemoryStore::new();
        let assets = MemoryAssets::new();
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let ingestor = Ingestor::new(
            Arc::new(store.clone()),
            Arc::new(assets),
            Transcoder::with_fonts(usvg::fontdb::Database::new()),
            config.ingest_settings(),
        );
        let state = AppState {
            config,
            store: Arc::new(store.clone()),
            ingestor,
        };
        (Arc::new(state), store)
    }

    fn request(method: Method, uri: &str, body: &str) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_HEADER, "21")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let (state, _) = state();
        let resp = function_handler(request(Method::OPTIONS, "/events", ""), state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
    }

    #[tokio::test]
    async fn unknown_event_is_404() {
        let (state, _) = state();
        let resp = function_handler(request(Method::GET, "/events/nope", ""), state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn batch_without_files_is_400() {
        let (state, store) = state();
        let body = r#"{"title":"t","date":"2025-01-01","location":"l","category":"c","files":[]}"#;
        let resp = function_handler(request(Method::POST, "/events", body), state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_method_on_events_is_405() {
        let (state, _) = state();
        let resp = function_handler(request(Method::PUT, "/events/abc", "{}"), state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn other_paths_are_404() {
        let (state, _) = state();
        let resp = function_handler(request(Method::GET, "/blocks", ""), state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
