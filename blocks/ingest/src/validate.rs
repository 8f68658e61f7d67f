//! Inbound request shapes and the checks that run before any side effect.

use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use gallery_atoms::events::NewEvent;
use serde::Deserialize;

use crate::error::IngestError;

pub const ACCEPTED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub files: Vec<FilePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub file_name: String,
    pub content_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Base64 file body; a `data:...;base64,` prefix is tolerated.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_file_bytes: usize,
    pub max_batch_files: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_batch_files: 24,
        }
    }
}

/// A decoded, accepted file with its batch position.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub index: usize,
    pub file_name: String,
    pub content_type: String,
    pub description: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BatchInput {
    pub event: NewEvent,
    pub files: Vec<SourceFile>,
}

pub fn validate_batch(
    req: CreateEventRequest,
    user_id: &str,
    limits: Limits,
) -> Result<BatchInput, IngestError> {
    if user_id.trim().is_empty() {
        return Err(IngestError::invalid(None, "owning user is required"));
    }
    require_text("title", &req.title)?;
    require_text("location", &req.location)?;
    let date = parse_date(&req.date)?;

    if req.files.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    if req.files.len() > limits.max_batch_files {
        return Err(IngestError::invalid(
            None,
            format!(
                "{} files submitted, at most {} allowed",
                req.files.len(),
                limits.max_batch_files
            ),
        ));
    }

    let files = req
        .files
        .into_iter()
        .enumerate()
        .map(|(index, payload)| validate_file(index, payload, limits))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchInput {
        event: NewEvent {
            title: req.title.trim().to_string(),
            description: req.description.filter(|d| !d.trim().is_empty()),
            date,
            location: req.location.trim().to_string(),
            category: req.category.trim().to_string(),
            user_id: user_id.trim().to_string(),
        },
        files,
    })
}

pub fn validate_file(index: usize, payload: FilePayload, limits: Limits) -> Result<SourceFile, IngestError> {
    let content_type = payload.content_type.trim().to_ascii_lowercase();
    if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(IngestError::invalid(
            Some(index),
            format!("unsupported media type {:?} for {}", payload.content_type, payload.file_name),
        ));
    }

    let encoded = match payload.data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload.data.as_str(),
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| IngestError::invalid(Some(index), format!("{}: bad base64: {}", payload.file_name, e)))?;

    if bytes.is_empty() {
        return Err(IngestError::invalid(Some(index), format!("{} is empty", payload.file_name)));
    }
    if bytes.len() > limits.max_file_bytes {
        return Err(IngestError::invalid(
            Some(index),
            format!(
                "{} is {} bytes, limit is {}",
                payload.file_name,
                bytes.len(),
                limits.max_file_bytes
            ),
        ));
    }

    Ok(SourceFile {
        index,
        file_name: payload.file_name,
        content_type,
        description: payload.description.filter(|d| !d.trim().is_empty()),
        bytes,
    })
}

fn require_text(field: &str, value: &str) -> Result<(), IngestError> {
    if value.trim().is_empty() {
        return Err(IngestError::invalid(None, format!("{} is required", field)));
    }
    Ok(())
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| IngestError::invalid(None, format!("date {:?} is not RFC 3339", raw)))
}
