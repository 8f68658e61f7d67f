use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::ServiceError;

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn error(status: StatusCode, kind: &str, message: impl Into<String>) -> Result<Response<Body>, Error> {
    json(
        status,
        &serde_json::json!({ "error": kind, "message": message.into() }),
    )
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error(StatusCode::NOT_FOUND, "NotFound", "Not found")
}

pub fn service_error(e: &ServiceError) -> Result<Response<Body>, Error> {
    let status = match e.kind() {
        "NotFound" => StatusCode::NOT_FOUND,
        "InvalidInput" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.kind(), e.to_string())
}
