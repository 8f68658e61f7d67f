use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patch::Field;

/// Which rendition of an uploaded file a row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageVariant {
    Original,
    Watermark,
}

impl ImageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageVariant::Original => "ORIGINAL",
            ImageVariant::Watermark => "WATERMARK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORIGINAL" => Some(ImageVariant::Original),
            "WATERMARK" => Some(ImageVariant::Watermark),
            _ => None,
        }
    }

    /// Remote folder name for this rendition.
    pub fn folder(&self) -> &'static str {
        match self {
            ImageVariant::Original => "originals",
            ImageVariant::Watermark => "watermarks",
        }
    }
}

/// Image domain model - one rendition of one file in an event
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Image {
    pub image_id: String,
    pub event_id: String,
    pub url: String,
    pub variant: ImageVariant,
    pub order: u32,
    pub description: Option<String>,
    /// Set only on WATERMARK rows; points at the paired ORIGINAL.
    pub original_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row to create inside a metadata transaction. The store assigns `image_id`.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub event_id: String,
    pub url: String,
    pub variant: ImageVariant,
    pub order: u32,
    pub description: Option<String>,
    pub original_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ImagePatch {
    #[serde(default)]
    pub description: Field<String>,
    pub order: Option<u32>,
}

impl ImagePatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_absent() && self.order.is_none()
    }

    pub fn apply_to(&self, image: &mut Image) {
        image.description = self.description.clone().apply(image.description.take());
        if let Some(order) = self.order {
            image.order = order;
        }
    }
}

/// Sort images for presentation: by `order`, ORIGINAL before WATERMARK.
pub fn sort_images(images: &mut [Image]) {
    images.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| (a.variant == ImageVariant::Watermark).cmp(&(b.variant == ImageVariant::Watermark)))
    });
}
