use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Saga record written before a batch uploads anything to the asset store.
///
/// Every object a batch uploads lives under `prefix`. A batch that commits flips the
/// intent to `Fulfilled` inside the metadata transaction; anything still `Pending`
/// after the reconciliation TTL owns orphaned objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadIntent {
    pub batch_id: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub state: IntentState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IntentState {
    Pending,
    Fulfilled { event_id: String },
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::Pending => "PENDING",
            IntentState::Fulfilled { .. } => "FULFILLED",
        }
    }
}

impl UploadIntent {
    pub fn pending(batch_id: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            prefix: prefix.into(),
            created_at: Utc::now(),
            state: IntentState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, IntentState::Pending)
    }
}
