//! Ingestion Orchestrator.
//!
//! Per file, concurrently and under a cap: transcode on the blocking pool, then
//! upload both renditions. Once every file succeeded, one metadata transaction
//! writes the event and all rows. The first failing file ends the batch; files
//! still in flight are dropped and files not yet started never start.

use std::sync::Arc;

use chrono::Datelike;
use futures::stream::{self, StreamExt};
use gallery_atoms::events::EventWithImages;
use gallery_atoms::intents::UploadIntent;
use gallery_atoms::media::{self, Image, ImageVariant};
use gallery_atoms::{MetadataStore, ServiceError};

use crate::coordinator::{self, FileResult};
use crate::error::IngestError;
use crate::phase::{BatchPhase, BatchTracker};
use crate::transcode::Transcoder;
use crate::uploader::{AssetUploader, Destination};
use crate::validate::{BatchInput, Limits, SourceFile};
use crate::watermark;

pub const DEFAULT_BRAND: &str = "M iMage Store";
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub brand: String,
    /// Per-request cap on files transcoding/uploading at once.
    pub concurrency: usize,
    pub limits: Limits,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            limits: Limits::default(),
        }
    }
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MetadataStore>,
    assets: Arc<dyn AssetUploader>,
    transcoder: Transcoder,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        assets: Arc<dyn AssetUploader>,
        transcoder: Transcoder,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            assets,
            transcoder,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Create an event from a validated batch.
    pub async fn ingest_batch(&self, batch: BatchInput) -> Result<EventWithImages, IngestError> {
        let BatchInput { event, files } = batch;
        if files.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let (batch_id, prefix) = self.open_intent().await?;
        let tracker = BatchTracker::new(&batch_id);
        let label = watermark::label(&self.settings.brand, event.date.year(), &event.title);
        let file_count = files.len();

        let outcome = async {
            tracker.advance(BatchPhase::Transcoding);

            let mut slots: Vec<Option<FileResult>> = vec![None; file_count];
            // Order and error index both come from batch position.
            let mut pipelines = stream::iter(files.into_iter().enumerate().map(|(index, file)| {
                self.process_file(&tracker, &prefix, &label, index, file, index as u32)
            }))
            .buffer_unordered(self.settings.concurrency.max(1));

            while let Some(result) = pipelines.next().await {
                let result = result?;
                let slot = result.order as usize;
                slots[slot] = Some(result);
            }
            drop(pipelines);

            let results = slots
                .into_iter()
                .enumerate()
                .map(|(index, slot)| {
                    slot.ok_or_else(|| IngestError::invalid(Some(index), "file produced no result"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tracker.advance(BatchPhase::AllTranscodedAndUploaded);

            tracker.advance(BatchPhase::Committing);
            coordinator::commit_batch(self.store.as_ref(), event, &results, &batch_id).await
        }
        .await;

        self.finish(&tracker, &batch_id, &prefix, outcome)
    }

    /// Add one file to an existing event, after its current last image.
    pub async fn ingest_single(&self, event_id: &str, file: SourceFile) -> Result<Vec<Image>, IngestError> {
        let event = self
            .store
            .get_event(event_id)
            .await
            .map_err(|e| IngestError::Persistence { index: None, source: e })?
            .ok_or_else(|| IngestError::NotFound(event_id.to_string()))?;

        let order = media::next_order(self.store.as_ref(), event_id)
            .await
            .map_err(service_to_ingest)?;

        let (batch_id, prefix) = self.open_intent().await?;
        let tracker = BatchTracker::new(&batch_id);
        let label = watermark::label(&self.settings.brand, event.date.year(), &event.title);

        let outcome = async {
            tracker.advance(BatchPhase::Transcoding);
            let index = file.index;
            let result = self.process_file(&tracker, &prefix, &label, index, file, order).await?;
            tracker.advance(BatchPhase::AllTranscodedAndUploaded);
            tracker.advance(BatchPhase::Committing);
            coordinator::append_to_event(self.store.as_ref(), &event, &result, &batch_id).await
        }
        .await;

        self.finish(&tracker, &batch_id, &prefix, outcome)
    }

    /// Record the upload intent that covers every object this request will create.
    async fn open_intent(&self) -> Result<(String, String), IngestError> {
        let batch_id = uuid::Uuid::new_v4().to_string();
        let prefix = format!("events/{}/", batch_id);
        self.store
            .record_intent(&UploadIntent::pending(&batch_id, &prefix))
            .await
            .map_err(|e| IngestError::Persistence { index: None, source: e })?;
        Ok((batch_id, prefix))
    }

    async fn process_file(
        &self,
        tracker: &BatchTracker,
        prefix: &str,
        label: &str,
        index: usize,
        file: SourceFile,
        order: u32,
    ) -> Result<FileResult, IngestError> {
        let SourceFile {
            file_name,
            description,
            bytes,
            ..
        } = file;
        tracing::info!(index, file_name = %file_name, size = bytes.len(), "transcoding");

        let renditions = self
            .transcoder
            .transcode_blocking(bytes, label.to_string())
            .await
            .map_err(|e| IngestError::transcode(index, e))?;

        tracker.advance(BatchPhase::Uploading);
        tracing::info!(index, width = renditions.width, height = renditions.height, "uploading renditions");

        let original_dest = Destination::new(format!("{}{}", prefix, ImageVariant::Original.folder()), order);
        let watermark_dest = Destination::new(format!("{}{}", prefix, ImageVariant::Watermark.folder()), order);
        let (original, stamped) = futures::try_join!(
            self.assets.upload(renditions.original, &original_dest),
            self.assets.upload(renditions.watermark, &watermark_dest),
        )
        .map_err(|e| IngestError::upload(index, e))?;

        Ok(FileResult {
            order,
            original_url: original.url,
            watermark_url: stamped.url,
            description,
        })
    }

    fn finish<T>(
        &self,
        tracker: &BatchTracker,
        batch_id: &str,
        prefix: &str,
        outcome: Result<T, IngestError>,
    ) -> Result<T, IngestError> {
        match outcome {
            Ok(value) => {
                tracker.advance(BatchPhase::Done);
                Ok(value)
            }
            Err(e) => {
                tracker.fail(&e);
                tracing::error!(
                    batch_id,
                    stage = ?e.stage(),
                    index = ?e.index(),
                    error = %e,
                    "ingestion failed"
                );
                tracing::warn!(
                    batch_id,
                    prefix,
                    "objects already uploaded under this prefix are orphaned until reconciliation"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("transcoder", &self.transcoder)
            .field("settings", &self.settings)
            .finish()
    }
}

fn service_to_ingest(e: ServiceError) -> IngestError {
    match e {
        ServiceError::Store(source) => IngestError::Persistence { index: None, source },
        ServiceError::NotFound(what) => IngestError::NotFound(what),
        ServiceError::InvalidInput(reason) => IngestError::invalid(None, reason),
    }
}

