pub mod error;
pub mod events;
pub mod intents;
pub mod media;
pub mod patch;
pub mod respond;
pub mod store;

pub use error::ServiceError;
pub use patch::Field;
pub use store::{MetadataStore, MetadataTransaction, StoreError};
