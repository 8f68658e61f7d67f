use gallery_atoms::StoreError;
use lambda_http::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::transcode::TranscodeError;
use crate::uploader::UploadError;

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Validate,
    Transcode,
    Upload,
    Commit,
}

/// Terminal error of one ingestion request. `index` is the file's batch position.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {reason}")]
    InvalidInput { index: Option<usize>, reason: String },

    #[error("at least one image file is required")]
    EmptyBatch,

    #[error("event {0} not found")]
    NotFound(String),

    #[error("file {index} could not be decoded: {reason}")]
    Decode { index: usize, reason: String },

    #[error("file {index} upload failed: {source}")]
    Upload {
        index: usize,
        #[source]
        source: UploadError,
    },

    #[error("metadata commit failed: {source}")]
    Persistence {
        index: Option<usize>,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn invalid(index: Option<usize>, reason: impl Into<String>) -> Self {
        IngestError::InvalidInput {
            index,
            reason: reason.into(),
        }
    }

    pub fn transcode(index: usize, err: TranscodeError) -> Self {
        match err {
            TranscodeError::Watermark(e) => IngestError::invalid(Some(index), e.to_string()),
            other => IngestError::Decode {
                index,
                reason: other.to_string(),
            },
        }
    }

    pub fn upload(index: usize, err: UploadError) -> Self {
        if err.is_invalid_input() {
            return IngestError::invalid(Some(index), err.to_string());
        }
        IngestError::Upload { index, source: err }
    }

    pub fn stage(&self) -> Stage {
        match self {
            IngestError::InvalidInput { .. } | IngestError::EmptyBatch | IngestError::NotFound(_) => {
                Stage::Validate
            }
            IngestError::Decode { .. } => Stage::Transcode,
            IngestError::Upload { .. } => Stage::Upload,
            IngestError::Persistence { .. } => Stage::Commit,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            IngestError::InvalidInput { index, .. } | IngestError::Persistence { index, .. } => *index,
            IngestError::Decode { index, .. } | IngestError::Upload { index, .. } => Some(*index),
            IngestError::EmptyBatch | IngestError::NotFound(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidInput { .. } => "InvalidInput",
            IngestError::EmptyBatch => "EmptyBatch",
            IngestError::NotFound(_) => "NotFound",
            IngestError::Decode { .. } => "DecodeError",
            IngestError::Upload { .. } => "UploadError",
            IngestError::Persistence { .. } => "PersistenceError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::InvalidInput { .. } | IngestError::EmptyBatch => StatusCode::BAD_REQUEST,
            IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::Upload { .. } => StatusCode::BAD_GATEWAY,
            IngestError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
