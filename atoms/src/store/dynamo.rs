//! Single-table DynamoDB layout:
//!
//! | item   | PK                 | SK                 |
//! |--------|--------------------|--------------------|
//! | event  | `EVENT#{event_id}` | `EVENT#{event_id}` |
//! | image  | `EVENT#{event_id}` | `IMAGE#{image_id}` |
//! | intent | `INTENT`           | `INTENT#{batch_id}`|
//! | claim  | `EVENT#{event_id}` | `ORDER#{variant}#{order}` |
//!
//! A claim item holds one `order` slot per variant and exists exactly as long as
//! the image row that took it, so a conditional put on the claim makes `order`
//! unique per (event, variant) even across concurrent transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeValue, Delete, DeleteRequest, Put, TransactWriteItem, Update, WriteRequest,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration};

use super::{MetadataStore, MetadataTransaction, StoreError};
use crate::events::model::{Event, NewEvent};
use crate::intents::{IntentState, UploadIntent};
use crate::media::model::{Image, ImageVariant, NewImage};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB refuses transactions with more items than this.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

/// Transaction items written per image row: the row and its order claim.
pub const ITEMS_PER_IMAGE: usize = 2;

const INTENT_PK: &str = "INTENT";

#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Query every item under a partition key, optionally narrowed to sort keys
    /// starting with `sk_prefix`. Follows pagination to the end.
    async fn query_partition(&self, pk: &str, sk_prefix: Option<&str>) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .set_exclusive_start_key(start_key.take());

            request = match sk_prefix {
                Some(prefix) => request
                    .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                    .expression_attribute_values(":sk_prefix", AttributeValue::S(prefix.to_string())),
                None => request.key_condition_expression("PK = :pk"),
            };

            let result = request.send().await.map_err(|e| backend("query", e))?;

            items.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn get_item(&self, pk: String, sk: String) -> Result<Option<Item>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| backend("get_item", e))?;

        Ok(result.item().cloned())
    }

    async fn transact(&self, items: Vec<TransactWriteItem>) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        if items.len() > MAX_TRANSACTION_ITEMS {
            return Err(StoreError::Aborted(format!(
                "{} writes exceed the {} item transaction limit",
                items.len(),
                MAX_TRANSACTION_ITEMS
            )));
        }

        match self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(match e.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    // Reasons come back one per item, in request order; "None" marks items that were fine.
                    let rejected = cancelled
                        .cancellation_reasons()
                        .iter()
                        .enumerate()
                        .find(|(_, r)| r.code().is_some_and(|code| code != "None"));
                    match rejected {
                        Some((position, reason)) => StoreError::Rejected {
                            position,
                            reason: format!(
                                "{}: {}",
                                reason.code().unwrap_or_default(),
                                reason.message().unwrap_or_default()
                            ),
                        },
                        None => StoreError::Aborted(
                            cancelled.message().unwrap_or("transaction cancelled").to_string(),
                        ),
                    }
                }
                other => StoreError::Backend(format!(
                    "DynamoDB transact_write_items error: {}",
                    DisplayErrorContext(&other)
                )),
            }),
        }
    }

    /// Batch delete items (25 per request, retrying unprocessed items).
    async fn batch_delete(&self, keys: Vec<Item>) -> Result<(), StoreError> {
        for chunk in keys.chunks(25) {
            let mut write_reqs = Vec::with_capacity(chunk.len());
            for key in chunk {
                let request = DeleteRequest::builder()
                    .set_key(Some(key.clone()))
                    .build()
                    .map_err(|e| StoreError::Malformed(e.to_string()))?;
                write_reqs.push(WriteRequest::builder().delete_request(request).build());
            }

            let mut unprocessed = Some(write_reqs);
            let mut attempts = 0;
            while let Some(reqs) = unprocessed {
                attempts += 1;
                let result = self
                    .client
                    .batch_write_item()
                    .request_items(&self.table_name, reqs)
                    .send()
                    .await
                    .map_err(|e| backend("batch_write_item", e))?;

                unprocessed = result
                    .unprocessed_items()
                    .and_then(|m| m.get(&self.table_name))
                    .filter(|v| !v.is_empty())
                    .cloned();

                if unprocessed.is_some() {
                    if attempts >= 5 {
                        return Err(StoreError::Backend(format!(
                            "batch delete left unprocessed items after {} attempts",
                            attempts
                        )));
                    }
                    sleep(Duration::from_millis(100 * attempts)).await;
                }
            }
        }
        Ok(())
    }

    fn delete(&self, key: Item, condition: Option<&str>) -> Result<TransactWriteItem, StoreError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(key))
            .set_condition_expression(condition.map(str::to_string))
            .build()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    /// Current row for each image, or `Rejected` at the first missing one.
    async fn existing_images(&self, event_id: &str, image_ids: &[&str]) -> Result<Vec<Image>, StoreError> {
        let mut rows = Vec::with_capacity(image_ids.len());
        for (position, image_id) in image_ids.iter().enumerate() {
            match self.get_image(event_id, image_id).await? {
                Some(row) => rows.push(row),
                None => {
                    return Err(StoreError::Rejected {
                        position,
                        reason: format!("image {} not found in event {}", image_id, event_id),
                    })
                }
            }
        }
        Ok(rows)
    }

    fn put(&self, item: Item, condition: &str) -> Result<TransactWriteItem, StoreError> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(condition)
            .build()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }
}

#[async_trait]
impl MetadataStore for DynamoStore {
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, StoreError> {
        Ok(Box::new(DynamoTransaction {
            store: self.clone(),
            items: Vec::new(),
            positions: Vec::new(),
            staged: 0,
        }))
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        let key = event_key(event_id);
        self.get_item(key.clone(), key)
            .await?
            .map(|item| event_from_item(&item))
            .transpose()
    }

    async fn put_event(&self, event: &Event) -> Result<(), StoreError> {
        let write = self.put(event_item(event), "attribute_exists(PK)")?;
        self.transact(vec![write]).await.map_err(|e| match e {
            StoreError::Rejected { .. } => StoreError::not_found("event", &event.event_id),
            other => other,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError> {
        let pk = event_key(event_id);
        // Everything under the event partition: the event row and its images.
        let items = self.query_partition(&pk, None).await?;
        if items.is_empty() {
            return Err(StoreError::not_found("event", event_id));
        }

        let keys = items
            .iter()
            .filter_map(|item| {
                let sk = item.get("SK")?.as_s().ok()?;
                Some(key_item(&pk, sk))
            })
            .collect();
        self.batch_delete(keys).await
    }

    async fn get_image(&self, event_id: &str, image_id: &str) -> Result<Option<Image>, StoreError> {
        self.get_item(event_key(event_id), image_key(image_id))
            .await?
            .map(|item| image_from_item(&item))
            .transpose()
    }

    async fn list_images(&self, event_id: &str) -> Result<Vec<Image>, StoreError> {
        self.query_partition(&event_key(event_id), Some("IMAGE#"))
            .await?
            .iter()
            .map(image_from_item)
            .collect()
    }

    async fn put_images(&self, images: &[Image]) -> Result<(), StoreError> {
        let mut writes = Vec::new();
        let mut positions = Vec::new();
        for (position, image) in images.iter().enumerate() {
            let current = self
                .get_image(&image.event_id, &image.image_id)
                .await?
                .ok_or_else(|| StoreError::Rejected {
                    position,
                    reason: format!("image {} does not exist", image.image_id),
                })?;

            writes.push(self.put(image_item(image), "attribute_exists(PK)")?);
            positions.push(position);
            if current.order != image.order || current.variant != image.variant {
                writes.push(self.delete(claim_key(&current), None)?);
                positions.push(position);
                writes.push(self.put(claim_item(image), "attribute_not_exists(PK)")?);
                positions.push(position);
            }
        }
        self.transact(writes).await.map_err(|e| at_positions(e, &positions))
    }

    async fn delete_images(&self, event_id: &str, image_ids: &[String]) -> Result<(), StoreError> {
        let ids: Vec<&str> = image_ids.iter().map(String::as_str).collect();
        let rows = self.existing_images(event_id, &ids).await?;

        let pk = event_key(event_id);
        let mut writes = Vec::with_capacity(rows.len() * ITEMS_PER_IMAGE);
        let mut positions = Vec::with_capacity(rows.len() * ITEMS_PER_IMAGE);
        for (position, row) in rows.iter().enumerate() {
            writes.push(self.delete(key_item(&pk, &image_key(&row.image_id)), Some("attribute_exists(PK)"))?);
            writes.push(self.delete(claim_key(row), None)?);
            positions.extend([position; ITEMS_PER_IMAGE]);
        }
        self.transact(writes).await.map_err(|e| at_positions(e, &positions))
    }

    async fn record_intent(&self, intent: &UploadIntent) -> Result<(), StoreError> {
        let write = self.put(intent_item(intent), "attribute_not_exists(PK)")?;
        self.transact(vec![write]).await
    }

    async fn pending_intents(&self, cutoff: DateTime<Utc>) -> Result<Vec<UploadIntent>, StoreError> {
        let mut intents = Vec::new();
        for item in self.query_partition(INTENT_PK, Some("INTENT#")).await? {
            let intent = intent_from_item(&item)?;
            if intent.is_pending() && intent.created_at < cutoff {
                intents.push(intent);
            }
        }
        Ok(intents)
    }

    async fn delete_intent(&self, batch_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(INTENT_PK.to_string()))
            .key("SK", AttributeValue::S(intent_key(batch_id)))
            .send()
            .await
            .map_err(|e| backend("delete_item", e))?;
        Ok(())
    }
}

/// Staged `TransactWriteItems` request. Nothing reaches DynamoDB before `commit`.
///
/// Positions reported by `Rejected` count staged writes (event, image, intent),
/// not raw items, so they match the in-memory backend.
pub struct DynamoTransaction {
    store: DynamoStore,
    items: Vec<TransactWriteItem>,
    positions: Vec<usize>,
    staged: usize,
}

impl DynamoTransaction {
    fn stage(&mut self, items: Vec<TransactWriteItem>) {
        self.positions.extend(std::iter::repeat(self.staged).take(items.len()));
        self.items.extend(items);
        self.staged += 1;
    }
}

#[async_trait]
impl MetadataTransaction for DynamoTransaction {
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
        let write = self.store.put(event_item(&event), "attribute_not_exists(PK)")?;
        self.stage(vec![write]);
        Ok(event)
    }

    async fn create_image(&mut self, new: NewImage) -> Result<Image, StoreError> {
        let position = self.staged;
        if new.variant == ImageVariant::Watermark && new.original_id.is_none() {
            return Err(StoreError::Rejected {
                position,
                reason: "WATERMARK rows must reference an ORIGINAL".to_string(),
            });
        }

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
        let row = self.store.put(image_item(&image), "attribute_not_exists(PK)")?;
        let claim = self.store.put(claim_item(&image), "attribute_not_exists(PK)")?;
        self.stage(vec![row, claim]);
        Ok(image)
    }

    async fn fulfil_intent(&mut self, batch_id: &str, event_id: &str) -> Result<(), StoreError> {
        let update = Update::builder()
            .table_name(&self.store.table_name)
            .set_key(Some(key_item(INTENT_PK, &intent_key(batch_id))))
            .update_expression("SET #state = :fulfilled, event_id = :event_id")
            .condition_expression("#state = :pending")
            .expression_attribute_names("#state", "state")
            .expression_attribute_values(":fulfilled", AttributeValue::S("FULFILLED".to_string()))
            .expression_attribute_values(":pending", AttributeValue::S("PENDING".to_string()))
            .expression_attribute_values(":event_id", AttributeValue::S(event_id.to_string()))
            .build()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        self.stage(vec![TransactWriteItem::builder().update(update).build()]);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let DynamoTransaction {
            store,
            items,
            positions,
            staged,
        } = *self;
        tracing::debug!(items = items.len(), staged, "committing DynamoDB transaction");
        store.transact(items).await.map_err(|e| at_positions(e, &positions))
    }

    async fn rollback(self: Box<Self>) {
        tracing::debug!(discarded = self.items.len(), "DynamoDB transaction discarded before commit");
    }
}

// ---------- keys ----------

fn event_key(event_id: &str) -> String {
    format!("EVENT#{}", event_id)
}

fn image_key(image_id: &str) -> String {
    format!("IMAGE#{}", image_id)
}

fn intent_key(batch_id: &str) -> String {
    format!("INTENT#{}", batch_id)
}

fn claim_sk(variant: ImageVariant, order: u32) -> String {
    format!("ORDER#{}#{}", variant.as_str(), order)
}

fn claim_key(image: &Image) -> Item {
    key_item(&event_key(&image.event_id), &claim_sk(image.variant, image.order))
}

fn claim_item(image: &Image) -> Item {
    let mut item = claim_key(image);
    item.insert("image_id".into(), AttributeValue::S(image.image_id.clone()));
    item
}

/// Translate a raw item index in a `Rejected` error to the caller's position.
fn at_positions(e: StoreError, positions: &[usize]) -> StoreError {
    match e {
        StoreError::Rejected { position, reason } => StoreError::Rejected {
            position: positions.get(position).copied().unwrap_or(position),
            reason,
        },
        other => other,
    }
}

fn key_item(pk: &str, sk: &str) -> Item {
    let mut key = HashMap::new();
    key.insert("PK".to_string(), AttributeValue::S(pk.to_string()));
    key.insert("SK".to_string(), AttributeValue::S(sk.to_string()));
    key
}

fn backend<E>(op: &str, e: aws_sdk_dynamodb::error::SdkError<E>) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::Backend(format!("DynamoDB {} error: {}", op, DisplayErrorContext(&e)))
}

// ---------- item mapping ----------

fn event_item(event: &Event) -> Item {
    let pk = event_key(&event.event_id);
    let mut item = key_item(&pk, &pk);
    item.insert("title".into(), AttributeValue::S(event.title.clone()));
    item.insert("date".into(), AttributeValue::S(event.date.to_rfc3339()));
    item.insert("location".into(), AttributeValue::S(event.location.clone()));
    item.insert("category".into(), AttributeValue::S(event.category.clone()));
    item.insert("user_id".into(), AttributeValue::S(event.user_id.clone()));
    item.insert("created_at".into(), AttributeValue::S(event.created_at.to_rfc3339()));
    item.insert("updated_at".into(), AttributeValue::S(event.updated_at.to_rfc3339()));
    if let Some(description) = &event.description {
        item.insert("description".into(), AttributeValue::S(description.clone()));
    }
    item
}

fn image_item(image: &Image) -> Item {
    let mut item = key_item(&event_key(&image.event_id), &image_key(&image.image_id));
    item.insert("url".into(), AttributeValue::S(image.url.clone()));
    item.insert("variant".into(), AttributeValue::S(image.variant.as_str().to_string()));
    item.insert("order".into(), AttributeValue::N(image.order.to_string()));
    item.insert("created_at".into(), AttributeValue::S(image.created_at.to_rfc3339()));
    if let Some(description) = &image.description {
        item.insert("description".into(), AttributeValue::S(description.clone()));
    }
    if let Some(original_id) = &image.original_id {
        item.insert("original_id".into(), AttributeValue::S(original_id.clone()));
    }
    item
}

fn intent_item(intent: &UploadIntent) -> Item {
    let mut item = key_item(INTENT_PK, &intent_key(&intent.batch_id));
    item.insert("prefix".into(), AttributeValue::S(intent.prefix.clone()));
    item.insert("created_at".into(), AttributeValue::S(intent.created_at.to_rfc3339()));
    item.insert("state".into(), AttributeValue::S(intent.state.as_str().to_string()));
    if let IntentState::Fulfilled { event_id } = &intent.state {
        item.insert("event_id".into(), AttributeValue::S(event_id.clone()));
    }
    item
}

fn opt_s(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn req_s(item: &Item, name: &str) -> Result<String, StoreError> {
    opt_s(item, name).ok_or_else(|| StoreError::Malformed(format!("missing attribute {}", name)))
}

fn req_time(item: &Item, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = req_s(item, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("{} is not RFC 3339 ({}): {}", name, raw, e)))
}

fn sk_id(item: &Item, prefix: &str) -> Result<String, StoreError> {
    let sk = req_s(item, "SK")?;
    sk.strip_prefix(prefix)
        .map(|id| id.to_string())
        .ok_or_else(|| StoreError::Malformed(format!("unexpected sort key {}", sk)))
}

fn event_from_item(item: &Item) -> Result<Event, StoreError> {
    Ok(Event {
        event_id: sk_id(item, "EVENT#")?,
        title: req_s(item, "title")?,
        description: opt_s(item, "description"),
        date: req_time(item, "date")?,
        location: req_s(item, "location")?,
        category: opt_s(item, "category").unwrap_or_else(|| "general".to_string()),
        user_id: req_s(item, "user_id")?,
        created_at: req_time(item, "created_at")?,
        updated_at: req_time(item, "updated_at")?,
    })
}

fn image_from_item(item: &Item) -> Result<Image, StoreError> {
    let pk = req_s(item, "PK")?;
    let event_id = pk
        .strip_prefix("EVENT#")
        .ok_or_else(|| StoreError::Malformed(format!("unexpected partition key {}", pk)))?
        .to_string();
    let variant = req_s(item, "variant")?;

    Ok(Image {
        image_id: sk_id(item, "IMAGE#")?,
        event_id,
        url: req_s(item, "url")?,
        variant: ImageVariant::parse(&variant)
            .ok_or_else(|| StoreError::Malformed(format!("unknown variant {}", variant)))?,
        order: item
            .get("order")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::Malformed("missing or invalid order".to_string()))?,
        description: opt_s(item, "description"),
        original_id: opt_s(item, "original_id"),
        created_at: req_time(item, "created_at")?,
    })
}

fn intent_from_item(item: &Item) -> Result<UploadIntent, StoreError> {
    let state = match req_s(item, "state")?.as_str() {
        "PENDING" => IntentState::Pending,
        "FULFILLED" => IntentState::Fulfilled {
            event_id: req_s(item, "event_id")?,
        },
        other => return Err(StoreError::Malformed(format!("unknown intent state {}", other))),
    };

    Ok(UploadIntent {
        batch_id: sk_id(item, "INTENT#")?,
        prefix: req_s(item, "prefix")?,
        created_at: req_time(item, "created_at")?,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(variant: ImageVariant, original_id: Option<&str>) -> Image {
        Image {
            image_id: "img-1".into(),
            event_id: "evt-1".into(),
            url: "https://bucket.s3.amazonaws.com/events/b/originals/0.jpg".into(),
            variant,
            order: 3,
            description: Some("stage left".into()),
            original_id: original_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn image_item_keys_live_under_the_event_partition() {
        let item = image_item(&sample_image(ImageVariant::Original, None));
        assert_eq!(opt_s(&item, "PK").as_deref(), Some("EVENT#evt-1"));
        assert_eq!(opt_s(&item, "SK").as_deref(), Some("IMAGE#img-1"));
        assert!(!item.contains_key("original_id"));
    }

    #[test]
    fn watermark_item_keeps_its_original_reference() {
        let image = sample_image(ImageVariant::Watermark, Some("img-0"));
        let parsed = image_from_item(&image_item(&image)).unwrap();
        assert_eq!(parsed.variant, ImageVariant::Watermark);
        assert_eq!(parsed.original_id.as_deref(), Some("img-0"));
        assert_eq!(parsed.order, 3);
    }

    #[test]
    fn claim_item_holds_the_order_slot() {
        let item = claim_item(&sample_image(ImageVariant::Watermark, Some("img-0")));
        assert_eq!(opt_s(&item, "PK").as_deref(), Some("EVENT#evt-1"));
        assert_eq!(opt_s(&item, "SK").as_deref(), Some("ORDER#WATERMARK#3"));
        assert_eq!(opt_s(&item, "image_id").as_deref(), Some("img-1"));
    }

    #[test]
    fn rejections_are_reported_per_staged_write() {
        // event, image row + claim, image row + claim, intent
        let positions = [0, 1, 1, 2, 2, 3];
        let raw = StoreError::Rejected {
            position: 4,
            reason: "ConditionalCheckFailed".into(),
        };
        assert!(matches!(at_positions(raw, &positions), StoreError::Rejected { position: 2, .. }));

        let aborted = at_positions(StoreError::Aborted("x".into()), &positions);
        assert!(matches!(aborted, StoreError::Aborted(_)));
    }

    #[test]
    fn unknown_variant_is_malformed() {
        let mut item = image_item(&sample_image(ImageVariant::Original, None));
        item.insert("variant".into(), AttributeValue::S("THUMBNAIL".into()));
        assert!(matches!(image_from_item(&item), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn intent_state_is_read_back() {
        let mut intent = UploadIntent::pending("batch-9", "events/batch-9/");
        intent.state = IntentState::Fulfilled {
            event_id: "evt-9".into(),
        };
        let parsed = intent_from_item(&intent_item(&intent)).unwrap();
        assert_eq!(parsed.batch_id, "batch-9");
        assert_eq!(parsed.state, intent.state);
    }
}
