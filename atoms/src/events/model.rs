use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::model::Image;
use crate::patch::Field;

/// Event domain model - a dated happening that owns a set of images
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scalar fields of an event about to be created. The store assigns `event_id`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub user_id: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Field<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_absent()
            && self.date.is_none()
            && self.location.is_none()
            && self.category.is_none()
    }

    pub fn apply_to(&self, event: &mut Event, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        event.description = self.description.clone().apply(event.description.take());
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(category) = &self.category {
            event.category = category.clone();
        }
        event.updated_at = now;
    }
}

/// Event joined with its images, ordered for presentation.
#[derive(Debug, Serialize, Clone)]
pub struct EventWithImages {
    #[serde(flatten)]
    pub event: Event,
    pub images: Vec<Image>,
}
