//! Metadata store capability.
//!
//! Services never reach for a global client: they take a `&dyn MetadataStore`
//! constructed at startup. Two backends exist:
//!
//! - [`dynamo::DynamoStore`]: single-table DynamoDB, transactions via `TransactWriteItems`
//! - [`memory::MemoryStore`]: in-process tables with the same staging and commit rules
//!
//! A [`MetadataTransaction`] stages rows and writes nothing until `commit`.
//! Dropping it (or calling `rollback`) discards everything staged.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::events::model::{Event, NewEvent};
use crate::intents::UploadIntent;
use crate::media::model::{Image, NewImage};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A staged write was refused. `position` is the zero-based index of the
    /// write within its transaction, in staging order.
    #[error("write {position} rejected: {reason}")]
    Rejected { position: usize, reason: String },

    #[error("transaction aborted: {0}")]
    Aborted(String),

    #[error("malformed item: {0}")]
    Malformed(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            StoreError::Rejected { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Open a transaction. Rows staged in it become visible only after `commit`.
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, StoreError>;

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError>;

    /// Overwrite an existing event row. Fails with `NotFound` if it vanished.
    async fn put_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Remove the event row and every image row it owns.
    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError>;

    async fn get_image(&self, event_id: &str, image_id: &str) -> Result<Option<Image>, StoreError>;

    /// All image rows of an event, in no particular order.
    async fn list_images(&self, event_id: &str) -> Result<Vec<Image>, StoreError>;

    /// Overwrite existing image rows atomically.
    async fn put_images(&self, images: &[Image]) -> Result<(), StoreError>;

    /// Remove image rows atomically.
    async fn delete_images(&self, event_id: &str, image_ids: &[String]) -> Result<(), StoreError>;

    async fn record_intent(&self, intent: &UploadIntent) -> Result<(), StoreError>;

    /// Intents still pending that were created before `cutoff`.
    async fn pending_intents(&self, cutoff: DateTime<Utc>) -> Result<Vec<UploadIntent>, StoreError>;

    async fn delete_intent(&self, batch_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MetadataTransaction: Send {
    /// Stage an event row. Its identifier is assigned here and usable immediately.
    async fn create_event(&mut self, new: NewEvent) -> Result<Event, StoreError>;

    /// Stage an image row. A WATERMARK must reference an ORIGINAL staged earlier
    /// in this transaction or already committed.
    async fn create_image(&mut self, new: NewImage) -> Result<Image, StoreError>;

    /// Mark an upload intent fulfilled as part of this transaction.
    async fn fulfil_intent(&mut self, batch_id: &str, event_id: &str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>);
}
