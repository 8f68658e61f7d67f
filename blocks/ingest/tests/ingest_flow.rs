use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use gallery_atoms::events::NewEvent;
use gallery_atoms::media::ImageVariant;
use gallery_atoms::store::MemoryStore;
use gallery_atoms::MetadataStore;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use ingest_block::uploader::{AssetUploader, Destination, UploadError, UploadedAsset};
use ingest_block::validate::{BatchInput, SourceFile};
use ingest_block::{
    reconcile_orphans, IngestError, IngestSettings, Ingestor, MemoryAssets, Stage, Transcoder,
};

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Jpeg(90))
        .unwrap();
    buf.into_inner()
}

fn source(index: usize, bytes: Vec<u8>) -> SourceFile {
    SourceFile {
        index,
        file_name: format!("file-{}.jpg", index),
        content_type: "image/jpeg".into(),
        description: Some(format!("photo {}", index)),
        bytes,
    }
}

fn batch(files: Vec<Vec<u8>>) -> BatchInput {
    BatchInput {
        event: NewEvent {
            title: "".into(),
            description: Some("Annual meetup".into()),
            date: Utc.with_ymd_and_hms(2025, 9, 14, 10, 0, 0).unwrap(),
            location: "Main hall".into(),
            category: "meetup".into(),
            user_id: "17".into(),
        },
        files: files
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| source(i, bytes))
            .collect(),
    }
}

fn settings(concurrency: usize) -> IngestSettings {
    IngestSettings {
        brand: "Brand".into(),
        concurrency,
        ..Default::default()
    }
}

fn ingestor_with(
    store: &MemoryStore,
    assets: Arc<dyn AssetUploader>,
    concurrency: usize,
) -> Ingestor {
    Ingestor::new(
        Arc::new(store.clone()),
        assets,
        Transcoder::with_fonts(usvg::fontdb::Database::new()),
        settings(concurrency),
    )
}

fn ingestor(store: &MemoryStore, assets: &MemoryAssets) -> Ingestor {
    ingestor_with(store, Arc::new(assets.clone()), 4)
}

async fn pending_count(store: &MemoryStore) -> usize {
    store
        .pending_intents(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn single_file_batch_creates_linked_pair() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    let created = ingestor(&store, &assets)
        .ingest_batch(batch(vec![jpeg(1200, 800)]))
        .await
        .unwrap();

    assert_eq!(created.images.len(), 2);
    let original = &created.images[0];
    let watermark = &created.images[1];
    assert_eq!((original.variant, original.order), (ImageVariant::Original, 0));
    assert_eq!((watermark.variant, watermark.order), (ImageVariant::Watermark, 0));
    assert_eq!(watermark.original_id.as_deref(), Some(original.image_id.as_str()));
    assert_eq!(original.description.as_deref(), Some("photo 0"));

    assert_eq!(store.event_count(), 1);
    assert_eq!(store.image_count(), 2);
    assert_eq!(assets.object_count(), 2);
    assert_eq!(pending_count(&store).await, 0);
}

#[tokio::test]
async fn renditions_decode_to_source_dimensions() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    let created = ingestor(&store, &assets)
        .ingest_batch(batch(vec![jpeg(1200, 800)]))
        .await
        .unwrap();

    for image in &created.images {
        let bytes = assets.get_url(&image.url).expect("uploaded object");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1200, 800), "{:?}", image.variant);
    }
}

#[tokio::test]
async fn order_follows_input_position_not_completion() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();
    // File 0 finishes last.
    assets.delay_order(0, Duration::from_millis(150));

    let created = ingestor(&store, &assets)
        .ingest_batch(batch(vec![jpeg(64, 48), jpeg(80, 60), jpeg(96, 72)]))
        .await
        .unwrap();

    assert_eq!(created.images.len(), 6);
    for (order, pair) in created.images.chunks(2).enumerate() {
        let order = order as u32;
        assert_eq!(pair[0].order, order);
        assert_eq!(pair[1].order, order);
        assert_eq!(pair[0].variant, ImageVariant::Original);
        assert_eq!(pair[1].original_id.as_deref(), Some(pair[0].image_id.as_str()));
        assert!(pair[0].url.contains(&format!("/originals/{}-", order)));
        assert!(pair[1].url.contains(&format!("/watermarks/{}-", order)));
        assert_eq!(pair[0].description, Some(format!("photo {}", order)));
    }
}

#[tokio::test]
async fn decode_failure_at_index_one_creates_no_rows() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    // One at a time, so file 0 is transcoded and uploaded before file 1 starts.
    let err = ingestor_with(&store, Arc::new(assets.clone()), 1)
        .ingest_batch(batch(vec![jpeg(40, 40), b"not an image at all".to_vec()]))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Decode { index: 1, .. }), "{:?}", err);
    assert_eq!(err.index(), Some(1));
    assert_eq!(err.stage(), Stage::Transcode);
    assert_eq!(assets.object_count(), 2);
    assert_eq!(store.event_count(), 0);
    assert_eq!(store.image_count(), 0);
    assert_eq!(pending_count(&store).await, 1);
}

#[tokio::test]
async fn orders_come_from_batch_position_not_file_index() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();
    let mut input = batch(vec![jpeg(32, 24), jpeg(24, 32)]);
    input.files[0].index = 3;
    input.files[1].index = 3;

    let created = ingestor(&store, &assets).ingest_batch(input).await.unwrap();

    let orders: Vec<_> = created.images.iter().map(|image| (image.variant, image.order)).collect();
    assert_eq!(
        orders,
        vec![
            (ImageVariant::Original, 0),
            (ImageVariant::Watermark, 0),
            (ImageVariant::Original, 1),
            (ImageVariant::Watermark, 1),
        ]
    );
}

#[tokio::test]
async fn orphans_from_a_failed_batch_are_reconciled() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();
    assets.fail_category("watermarks");

    let err = ingestor(&store, &assets)
        .ingest_batch(batch(vec![jpeg(40, 40)]))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Upload);
    assert_eq!(err.index(), Some(0));
    assert_eq!(store.event_count(), 0);

    let orphaned = assets.object_count();
    assert!(orphaned >= 1, "original rendition should have landed");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let report = reconcile_orphans(&store, &assets, Duration::ZERO).await.unwrap();
    assert_eq!(report.swept, 1);
    assert_eq!(report.objects_deleted, orphaned);
    assert_eq!(assets.object_count(), 0);
    assert_eq!(pending_count(&store).await, 0);
}

#[tokio::test]
async fn commit_failure_reports_file_index_and_rolls_back() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();
    store.reject_image_order(1);

    let err = ingestor(&store, &assets)
        .ingest_batch(batch(vec![jpeg(32, 32), jpeg(32, 32), jpeg(32, 32)]))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Commit);
    assert_eq!(err.index(), Some(1));
    assert_eq!(store.event_count(), 0);
    assert_eq!(store.image_count(), 0);
    // Uploads are not rolled back.
    assert_eq!(assets.object_count(), 6);
}

#[tokio::test]
async fn first_failure_stops_files_that_have_not_started() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    let err = ingestor_with(&store, Arc::new(assets.clone()), 1)
        .ingest_batch(batch(vec![b"garbage".to_vec(), jpeg(32, 32), jpeg(32, 32)]))
        .await
        .unwrap_err();

    assert_eq!(err.index(), Some(0));
    assert_eq!(assets.object_count(), 0);
}

#[derive(Default)]
struct CountingUploader {
    active: AtomicUsize,
    peak: AtomicUsize,
    inner: MemoryAssets,
}

#[async_trait]
impl AssetUploader for CountingUploader {
    async fn upload(&self, bytes: Vec<u8>, dest: &Destination) -> Result<UploadedAsset, UploadError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let out = self.inner.upload(bytes, dest).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[tokio::test]
async fn concurrency_cap_bounds_in_flight_files() {
    let store = MemoryStore::new();
    let uploader = Arc::new(CountingUploader::default());

    let files = (0..6).map(|_| jpeg(24, 24)).collect();
    ingestor_with(&store, uploader.clone(), 2)
        .ingest_batch(batch(files))
        .await
        .unwrap();

    // Two files at a time, two renditions each.
    assert!(uploader.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(uploader.inner.object_count(), 12);
}

#[tokio::test]
async fn single_upload_appends_after_last_original() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();
    let ingestor = ingestor(&store, &assets);

    let created = ingestor
        .ingest_batch(batch(vec![jpeg(32, 32), jpeg(32, 32)]))
        .await
        .unwrap();

    let pair = ingestor
        .ingest_single(&created.event.event_id, source(0, jpeg(50, 30)))
        .await
        .unwrap();

    assert_eq!(pair.len(), 2);
    assert_eq!(pair[0].order, 2);
    assert_eq!(pair[1].original_id.as_deref(), Some(pair[0].image_id.as_str()));
    assert_eq!(store.image_count(), 6);
    assert_eq!(pending_count(&store).await, 0);
}

#[tokio::test]
async fn single_upload_to_missing_event_is_not_found() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    let err = ingestor(&store, &assets)
        .ingest_single("nope", source(0, jpeg(10, 10)))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::NotFound(_)));
    assert_eq!(assets.object_count(), 0);
}

#[tokio::test]
async fn empty_batch_fails_before_any_side_effect() {
    let store = MemoryStore::new();
    let assets = MemoryAssets::new();

    let err = ingestor(&store, &assets).ingest_batch(batch(vec![])).await.unwrap_err();
    assert!(matches!(err, IngestError::EmptyBatch));
    assert_eq!(pending_count(&store).await, 0);
}
