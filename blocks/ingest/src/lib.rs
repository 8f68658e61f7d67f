pub mod coordinator;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod phase;
pub mod reconcile;
pub mod transcode;
pub mod uploader;
pub mod validate;
pub mod watermark;

pub use error::{IngestError, Stage};
pub use orchestrator::{IngestSettings, Ingestor};
pub use reconcile::{reconcile_orphans, ReconcileReport};
pub use transcode::Transcoder;
pub use uploader::{AssetReaper, AssetUploader, MemoryAssets, S3Assets};
