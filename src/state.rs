//! App-wide client state with an explicit lifecycle.
//!
//! Constructed once at app start and handed to whoever needs it; `sign_out`
//! returns it to the freshly constructed state. Tests build their own
//! instances.

use tracing::info;

use crate::{
    core::batch::{BatchError, BatchStore},
    types::{EpochMs, UserId},
};

/// Client state shared across screens.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    user_id: Option<UserId>,
    has_seen_onboarding: bool,
    batches: BatchStore,
}

impl AppState {
    /// State at app start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed-in user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Records the signed-in user.
    pub fn sign_in(&mut self, user_id: impl Into<UserId>) {
        self.user_id = Some(user_id.into());
    }

    /// Drops everything tied to the signed-in user.
    pub fn sign_out(&mut self) {
        info!(user = ?self.user_id, batches = self.batches.len(), "resetting app state on sign-out");
        *self = Self::default();
    }

    /// True once onboarding was completed or skipped.
    pub fn has_seen_onboarding(&self) -> bool {
        self.has_seen_onboarding
    }

    /// Marks onboarding as seen.
    pub fn mark_onboarding_seen(&mut self) {
        self.has_seen_onboarding = true;
    }

    /// In-flight image batches.
    pub fn batches(&self) -> &BatchStore {
        &self.batches
    }

    /// Applies one batch reducer; on error the batches are unchanged.
    pub fn update_batches(
        &mut self,
        reducer: impl FnOnce(&BatchStore) -> Result<BatchStore, BatchError>,
    ) -> Result<(), BatchError> {
        self.batches = reducer(&self.batches)?;
        Ok(())
    }

    /// Drops finished batches older than `retention_ms`; returns how many.
    pub fn sweep_batches(&mut self, now_ms: EpochMs, retention_ms: u64) -> usize {
        let (batches, removed) = self.batches.sweep_finished(now_ms, retention_ms);
        self.batches = batches;
        removed
    }
}
