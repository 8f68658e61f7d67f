use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MetadataStore, MetadataTransaction, StoreError};
use crate::events::model::{Event, NewEvent};
use crate::intents::{IntentState, UploadIntent};
use crate::media::model::{Image, ImageVariant, NewImage};

#[derive(Debug, Default)]
struct Tables {
    events: BTreeMap<String, Event>,
    images: BTreeMap<String, Image>,
    intents: BTreeMap<String, UploadIntent>,
    faults: Faults,
}

#[derive(Debug, Default)]
struct Faults {
    reject_image_order: Option<u32>,
    abort_next_commit: bool,
}

/// In-process store with the same transaction rules as the DynamoDB backend.
///
/// Cheap to clone; clones share tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicked holder cannot leave half-applied writes behind: commits
        // validate first and apply afterwards.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse any staged image row with this `order`.
    pub fn reject_image_order(&self, order: u32) {
        self.lock().faults.reject_image_order = Some(order);
    }

    /// Make the next commit fail after validation.
    pub fn abort_next_commit(&self) {
        self.lock().faults.abort_next_commit = true;
    }

    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    pub fn image_count(&self) -> usize {
        self.lock().images.len()
    }

    pub fn intent(&self, batch_id: &str) -> Option<UploadIntent> {
        self.lock().intents.get(batch_id).cloned()
    }

    /// Backdate an intent so reconciliation treats it as stale.
    pub fn backdate_intent(&self, batch_id: &str, created_at: DateTime<Utc>) {
        if let Some(intent) = self.lock().intents.get_mut(batch_id) {
            intent.created_at = created_at;
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            writes: Vec::new(),
        }))
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.lock().events.get(event_id).cloned())
    }

    async fn put_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut tables = self.lock();
        match tables.events.get_mut(&event.event_id) {
            Some(row) => {
                *row = event.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("event", &event.event_id)),
        }
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.events.remove(event_id).is_none() {
            return Err(StoreError::not_found("event", event_id));
        }
        tables.images.retain(|_, image| image.event_id != event_id);
        Ok(())
    }

    async fn get_image(&self, event_id: &str, image_id: &str) -> Result<Option<Image>, StoreError> {
        Ok(self
            .lock()
            .images
            .get(image_id)
            .filter(|image| image.event_id == event_id)
            .cloned())
    }

    async fn list_images(&self, event_id: &str) -> Result<Vec<Image>, StoreError> {
        Ok(self
            .lock()
            .images
            .values()
            .filter(|image| image.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn put_images(&self, images: &[Image]) -> Result<(), StoreError> {
        let mut tables = self.lock();
        for (position, image) in images.iter().enumerate() {
            let rejected = |reason: String| StoreError::Rejected { position, reason };
            if !tables.images.contains_key(&image.image_id) {
                return Err(rejected(format!("image {} does not exist", image.image_id)));
            }
            let same_slot = |row: &Image| {
                row.event_id == image.event_id && row.variant == image.variant && row.order == image.order
            };
            let clash = tables
                .images
                .values()
                .filter(|row| !images.iter().any(|i| i.image_id == row.image_id))
                .chain(&images[..position])
                .any(same_slot);
            if clash {
                return Err(rejected(format!(
                    "{} order {} already taken in event {}",
                    image.variant.as_str(),
                    image.order,
                    image.event_id
                )));
            }
        }
        for image in images {
            tables.images.insert(image.image_id.clone(), image.clone());
        }
        Ok(())
    }

    async fn delete_images(&self, event_id: &str, image_ids: &[String]) -> Result<(), StoreError> {
        let mut tables = self.lock();
        for (position, id) in image_ids.iter().enumerate() {
            match tables.images.get(id) {
                Some(image) if image.event_id == event_id => {}
                _ => {
                    return Err(StoreError::Rejected {
                        position,
                        reason: format!("image {} not found in event {}", id, event_id),
                    })
                }
            }
        }
        for id in image_ids {
            tables.images.remove(id);
        }
        Ok(())
    }

    async fn record_intent(&self, intent: &UploadIntent) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.intents.contains_key(&intent.batch_id) {
            return Err(StoreError::Rejected {
                position: 0,
                reason: format!("intent {} already recorded", intent.batch_id),
            });
        }
        tables.intents.insert(intent.batch_id.clone(), intent.clone());
        Ok(())
    }

    async fn pending_intents(&self, cutoff: DateTime<Utc>) -> Result<Vec<UploadIntent>, StoreError> {
        Ok(self
            .lock()
            .intents
            .values()
            .filter(|intent| intent.is_pending() && intent.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn delete_intent(&self, batch_id: &str) -> Result<(), StoreError> {
        self.lock().intents.remove(batch_id);
        Ok(())
    }
}

#[derive(Debug)]
enum StagedWrite {
    Event(Event),
    Image(Image),
    FulfilIntent { batch_id: String, event_id: String },
}

pub struct MemoryTransaction {
    store: MemoryStore,
    writes: Vec<StagedWrite>,
}

fn staged_images(staged: &[StagedWrite]) -> impl Iterator<Item = &Image> {
    staged.iter().filter_map(|w| match w {
        StagedWrite::Image(image) => Some(image),
        _ => None,
    })
}

/// Checks a new image row against committed rows plus the writes staged before it.
fn check_image(tables: &Tables, staged: &[StagedWrite], image: &Image) -> Result<(), String> {
    let event_staged = staged
        .iter()
        .any(|w| matches!(w, StagedWrite::Event(e) if e.event_id == image.event_id));
    if !tables.events.contains_key(&image.event_id) && !event_staged {
        return Err(format!("event {} does not exist", image.event_id));
    }

    let mut rows = tables.images.values().chain(staged_images(staged));
    if rows.any(|row| {
        row.event_id == image.event_id && row.variant == image.variant && row.order == image.order
    }) {
        return Err(format!(
            "{} order {} already taken in event {}",
            image.variant.as_str(),
            image.order,
            image.event_id
        ));
    }

    match (image.variant, image.original_id.as_deref()) {
        (ImageVariant::Original, None) => Ok(()),
        (ImageVariant::Original, Some(_)) => Err("ORIGINAL rows cannot reference another row".into()),
        (ImageVariant::Watermark, None) => Err("WATERMARK rows must reference an ORIGINAL".into()),
        (ImageVariant::Watermark, Some(original_id)) => {
            let original = tables
                .images
                .get(original_id)
                .or_else(|| staged_images(staged).find(|row| row.image_id == original_id));
            match original {
                Some(o)
                    if o.variant == ImageVariant::Original
                        && o.event_id == image.event_id
                        && o.order == image.order =>
                {
                    Ok(())
                }
                Some(_) => Err(format!("{} is not a matching ORIGINAL", original_id)),
                None => Err(format!("original {} has not been written", original_id)),
            }
        }
    }
}

#[async_trait]
impl MetadataTransaction for MemoryTransaction {
    async fn create_event(&mut self, new: NewEvent) -> Result<Event, StoreError> {
        let now = Utc::now();
        let event = Event {
            event_id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            date: new.date,
            location: new.location,
            category: new.category,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        self.writes.push(StagedWrite::Event(event.clone()));
        Ok(event)
    }

    async fn create_image(&mut self, new: NewImage) -> Result<Image, StoreError> {
        let position = self.writes.len();
        let image = Image {
            image_id: uuid::Uuid::new_v4().to_string(),
            event_id: new.event_id,
            url: new.url,
            variant: new.variant,
            order: new.order,
            description: new.description,
            original_id: new.original_id,
            created_at: Utc::now(),
        };

        let check = {
            let tables = self.store.lock();
            if tables.faults.reject_image_order == Some(image.order) {
                Err(format!("injected failure for order {}", image.order))
            } else {
                check_image(&tables, &self.writes, &image)
            }
        };
        check.map_err(|reason| StoreError::Rejected { position, reason })?;

        self.writes.push(StagedWrite::Image(image.clone()));
        Ok(image)
    }

    async fn fulfil_intent(&mut self, batch_id: &str, event_id: &str) -> Result<(), StoreError> {
        self.writes.push(StagedWrite::FulfilIntent {
            batch_id: batch_id.to_string(),
            event_id: event_id.to_string(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { store, writes } = *self;
        let mut tables = store.lock();

        if std::mem::take(&mut tables.faults.abort_next_commit) {
            return Err(StoreError::Aborted("injected commit failure".into()));
        }

        // Rows committed since staging can clash with this transaction's rows.
        for (position, write) in writes.iter().enumerate() {
            let rejected = |reason: String| StoreError::Rejected { position, reason };
            match write {
                StagedWrite::Image(image) => check_image(&tables, &writes[..position], image).map_err(rejected)?,
                StagedWrite::Event(event) if tables.events.contains_key(&event.event_id) => {
                    return Err(rejected(format!("event {} already exists", event.event_id)));
                }
                StagedWrite::FulfilIntent { batch_id, .. } => match tables.intents.get(batch_id) {
                    Some(intent) if intent.is_pending() => {}
                    Some(_) => return Err(rejected(format!("intent {} already fulfilled", batch_id))),
                    None => return Err(rejected(format!("intent {} was never recorded", batch_id))),
                },
                _ => {}
            }
        }

        for write in writes {
            match write {
                StagedWrite::Event(event) => {
                    tables.events.insert(event.event_id.clone(), event);
                }
                StagedWrite::Image(image) => {
                    tables.images.insert(image.image_id.clone(), image);
                }
                StagedWrite::FulfilIntent { batch_id, event_id } => {
                    if let Some(intent) = tables.intents.get_mut(&batch_id) {
                        intent.state = IntentState::Fulfilled { event_id };
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        tracing::debug!(discarded = self.writes.len(), "memory transaction rolled back");
    }
}
