use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{BatchId, EpochMs, TempId};

/// Reducer failures; the store is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// No batch with this id is tracked.
    #[error("unknown batch {0}")]
    UnknownBatch(BatchId),
    /// A batch with this id is already tracked.
    #[error("batch {0} already exists")]
    AlreadyExists(BatchId),
    /// The batch has no image with this temp id.
    #[error("batch {batch_id} has no image {temp_id}")]
    UnknownImage {
        /// Batch searched.
        batch_id: BatchId,
        /// Missing image.
        temp_id: TempId,
    },
    /// The batch already reached `Complete` or `Error`.
    #[error("batch {0} is finished")]
    Finished(BatchId),
    /// Requested image transition would move backwards.
    #[error("image {temp_id} cannot move from {from:?} to {to:?}")]
    ImageRegression {
        /// Image being updated.
        temp_id: TempId,
        /// Current status.
        from: ImageStatus,
        /// Rejected status.
        to: ImageStatus,
    },
}

/// Extraction progress of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Uploaded or queued, not yet picked up.
    Pending,
    /// Extraction workflow running.
    Processing,
    /// Event created.
    Success,
    /// Extraction failed.
    Error,
}

impl ImageStatus {
    /// True for `Success` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Success | Self::Error => 2,
        }
    }
}

/// Aggregate status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created but nothing submitted.
    Idle,
    /// Images are being uploaded.
    Uploading,
    /// At least one image is being processed.
    Processing,
    /// Every image reached a terminal status.
    Complete,
    /// The batch as a whole failed.
    Error,
}

impl BatchStatus {
    /// True for `Complete` and `Error`.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Uploading => 1,
            Self::Processing => 2,
            Self::Complete | Self::Error => 3,
        }
    }

    fn advance_to(self, next: Self) -> Self {
        if next.rank() > self.rank() { next } else { self }
    }
}

/// One image inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchImage {
    /// Client-generated image id.
    pub temp_id: TempId,
    /// Extraction progress.
    pub status: ImageStatus,
    /// Failure reason once `status` is `Error`.
    pub error: Option<String>,
}

/// Progress of a set of images submitted together.
///
/// `processed_count == success_count + error_count` after every reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUploadState {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// Images in submission order.
    pub images: Vec<BatchImage>,
    /// Images with a reported outcome.
    pub processed_count: usize,
    /// Images that produced an event.
    pub success_count: usize,
    /// Images that failed.
    pub error_count: usize,
    /// Aggregate status.
    pub status: BatchStatus,
    /// When the batch finished.
    pub completed_at: Option<EpochMs>,
}

impl BatchUploadState {
    /// Images still waiting for an outcome.
    pub fn remaining(&self) -> usize {
        self.images.len().saturating_sub(self.processed_count)
    }

    fn finish(&mut self, status: BatchStatus, now_ms: EpochMs) {
        self.status = self.status.advance_to(status);
        self.completed_at.get_or_insert(now_ms);
    }
}

/// Immutable map of in-flight batches.
///
/// Every reducer returns a new store in which only the touched entry was
/// replaced; untouched entries are shared with the previous store.
#[derive(Debug, Clone, Default)]
pub struct BatchStore {
    batches: HashMap<BatchId, Arc<BatchUploadState>>,
}

impl BatchStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a batch.
    pub fn get(&self, batch_id: &str) -> Option<&BatchUploadState> {
        self.batches.get(batch_id).map(Arc::as_ref)
    }

    /// Number of tracked batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// True when no batch is tracked.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Starts tracking a batch; every image begins `Pending`.
    pub fn create_batch(
        &self,
        batch_id: impl Into<BatchId>,
        temp_ids: impl IntoIterator<Item = TempId>,
    ) -> Result<Self, BatchError> {
        let batch_id = batch_id.into();
        if self.batches.contains_key(&batch_id) {
            return Err(BatchError::AlreadyExists(batch_id));
        }

        let images: Vec<BatchImage> = temp_ids
            .into_iter()
            .map(|temp_id| BatchImage {
                temp_id,
                status: ImageStatus::Pending,
                error: None,
            })
            .collect();
        let status = if images.is_empty() {
            BatchStatus::Idle
        } else {
            BatchStatus::Uploading
        };

        let state = BatchUploadState {
            batch_id: batch_id.clone(),
            images,
            processed_count: 0,
            success_count: 0,
            error_count: 0,
            status,
            completed_at: None,
        };
        Ok(self.with_entry(batch_id, state))
    }

    /// Moves one image forward; an image entering `Processing` moves the batch too.
    pub fn update_image_status(
        &self,
        batch_id: &str,
        temp_id: &str,
        status: ImageStatus,
        error: Option<String>,
    ) -> Result<Self, BatchError> {
        let mut state = self.open_batch(batch_id)?;
        let image = state
            .images
            .iter_mut()
            .find(|img| img.temp_id == temp_id)
            .ok_or_else(|| BatchError::UnknownImage {
                batch_id: batch_id.to_string(),
                temp_id: temp_id.to_string(),
            })?;

        if image.status.is_terminal() || status.rank() < image.status.rank() {
            return Err(BatchError::ImageRegression {
                temp_id: temp_id.to_string(),
                from: image.status,
                to: status,
            });
        }
        image.status = status;
        image.error = if status == ImageStatus::Error { error } else { None };

        if status != ImageStatus::Pending {
            state.status = state.status.advance_to(BatchStatus::Processing);
        }
        Ok(self.with_entry(state.batch_id.clone(), state))
    }

    /// Records one reported outcome; the batch completes once every image has one.
    pub fn increment_processed(
        &self,
        batch_id: &str,
        success: bool,
        now_ms: EpochMs,
    ) -> Result<Self, BatchError> {
        let mut state = self.open_batch(batch_id)?;
        if state.remaining() == 0 {
            return Err(BatchError::Finished(batch_id.to_string()));
        }

        state.processed_count += 1;
        if success {
            state.success_count += 1;
        } else {
            state.error_count += 1;
        }
        state.status = state.status.advance_to(BatchStatus::Processing);
        if state.remaining() == 0 {
            state.finish(BatchStatus::Complete, now_ms);
        }
        Ok(self.with_entry(state.batch_id.clone(), state))
    }

    /// Marks the batch complete, whatever its remaining images.
    pub fn complete_batch(&self, batch_id: &str, now_ms: EpochMs) -> Result<Self, BatchError> {
        let mut state = self.open_batch(batch_id)?;
        state.finish(BatchStatus::Complete, now_ms);
        Ok(self.with_entry(state.batch_id.clone(), state))
    }

    /// Marks the whole batch failed, e.g. when the upload itself errored.
    pub fn fail_batch(&self, batch_id: &str, now_ms: EpochMs) -> Result<Self, BatchError> {
        let mut state = self.open_batch(batch_id)?;
        state.finish(BatchStatus::Error, now_ms);
        Ok(self.with_entry(state.batch_id.clone(), state))
    }

    /// Stops tracking a batch. Clearing an unknown batch is a no-op.
    pub fn clear_batch(&self, batch_id: &str) -> Self {
        if !self.batches.contains_key(batch_id) {
            return self.clone();
        }
        let mut batches = self.batches.clone();
        batches.remove(batch_id);
        Self { batches }
    }

    /// Drops finished batches older than `retention_ms`; returns the new store and the count removed.
    pub fn sweep_finished(&self, now_ms: EpochMs, retention_ms: u64) -> (Self, usize) {
        let batches: HashMap<_, _> = self
            .batches
            .iter()
            .filter(|(_, state)| {
                !state
                    .completed_at
                    .is_some_and(|at| now_ms.saturating_sub(at) >= retention_ms)
            })
            .map(|(id, state)| (id.clone(), Arc::clone(state)))
            .collect();
        let removed = self.batches.len() - batches.len();
        (Self { batches }, removed)
    }

    fn open_batch(&self, batch_id: &str) -> Result<BatchUploadState, BatchError> {
        let state = self
            .batches
            .get(batch_id)
            .ok_or_else(|| BatchError::UnknownBatch(batch_id.to_string()))?;
        if state.status.is_finished() {
            return Err(BatchError::Finished(batch_id.to_string()));
        }
        Ok(state.as_ref().clone())
    }

    fn with_entry(&self, batch_id: BatchId, state: BatchUploadState) -> Self {
        let mut batches = self.batches.clone();
        batches.insert(batch_id, Arc::new(state));
        Self { batches }
    }
}
