use std::sync::Mutex;

use crate::error::{IngestError, Stage};

/// Where a batch is in the ingestion flow.
///
/// `Transcoding` and `Uploading` describe the fan-out as a whole: the batch enters
/// `Uploading` once the first file reaches its upload step. Per-file progress is
/// logged with the file index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Transcoding,
    Uploading,
    AllTranscodedAndUploaded,
    Committing,
    Done,
    Failed { stage: Stage, index: Option<usize> },
}

impl BatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchPhase::Done | BatchPhase::Failed { .. })
    }

    pub fn can_advance_to(&self, next: &BatchPhase) -> bool {
        use BatchPhase::*;
        match (self, next) {
            (from, Failed { .. }) => !from.is_terminal(),
            (Idle, Transcoding)
            | (Transcoding, Uploading)
            | (Uploading, AllTranscodedAndUploaded)
            | (AllTranscodedAndUploaded, Committing)
            | (Committing, Done) => true,
            _ => false,
        }
    }
}

/// Phase of one batch, shared by its concurrent per-file pipelines.
#[derive(Debug)]
pub struct BatchTracker {
    batch_id: String,
    phase: Mutex<BatchPhase>,
}

impl BatchTracker {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            phase: Mutex::new(BatchPhase::Idle),
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Move to `next`. Re-entering the current phase is a no-op; returns whether
    /// the phase changed.
    pub fn advance(&self, next: BatchPhase) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        if *phase == next {
            return false;
        }
        if !phase.can_advance_to(&next) {
            tracing::warn!(
                batch_id = %self.batch_id,
                from = ?*phase,
                to = ?next,
                "ignoring illegal batch phase transition"
            );
            return false;
        }
        tracing::info!(batch_id = %self.batch_id, from = ?*phase, to = ?next, "batch phase");
        *phase = next;
        true
    }

    pub fn fail(&self, err: &IngestError) {
        self.advance(BatchPhase::Failed {
            stage: err.stage(),
            index: err.index(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let tracker = BatchTracker::new("b");
        for next in [
            BatchPhase::Transcoding,
            BatchPhase::Uploading,
            BatchPhase::AllTranscodedAndUploaded,
            BatchPhase::Committing,
            BatchPhase::Done,
        ] {
            assert!(tracker.advance(next));
        }
        assert!(tracker.phase().is_terminal());
    }

    #[test]
    fn cannot_skip_to_commit() {
        assert!(!BatchPhase::Transcoding.can_advance_to(&BatchPhase::Committing));
        let tracker = BatchTracker::new("b");
        assert!(!tracker.advance(BatchPhase::Done));
        assert_eq!(tracker.phase(), BatchPhase::Idle);
    }

    #[test]
    fn failure_is_reachable_from_any_live_phase_and_sticks() {
        let tracker = BatchTracker::new("b");
        tracker.advance(BatchPhase::Transcoding);
        tracker.fail(&IngestError::Decode {
            index: 1,
            reason: "bad".into(),
        });
        assert_eq!(
            tracker.phase(),
            BatchPhase::Failed {
                stage: Stage::Transcode,
                index: Some(1)
            }
        );
        assert!(!tracker.advance(BatchPhase::Uploading));
    }

    #[test]
    fn repeated_advance_is_idempotent() {
        let tracker = BatchTracker::new("b");
        tracker.advance(BatchPhase::Transcoding);
        tracker.advance(BatchPhase::Uploading);
        assert!(!tracker.advance(BatchPhase::Uploading));
    }
}
