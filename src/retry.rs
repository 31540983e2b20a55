//! Backoff retry for "user not yet synchronized" query failures.
//!
//! Right after sign-in the identity provider knows the user before the backend
//! has provisioned its user record. Queries issued in that window fail with
//! [`QueryError::UserNotSynced`]; [`SyncRetry`] hides those failures behind a
//! bounded exponential backoff and only reports a terminal error once the
//! attempts run out. Every other failure is surfaced on the first occurrence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Message the backend uses for a user record that does not exist yet.
const USER_NOT_FOUND_MESSAGE: &str = "User not found";

/// Failure reported by the backend-client boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The signed-in user has no backend record yet.
    #[error("user not yet synchronized: {message}")]
    UserNotSynced {
        /// Backend message.
        message: String,
    },
    /// Any other backend failure (permissions, network, validation).
    #[error("query failed: {message}")]
    Backend {
        /// Backend message.
        message: String,
    },
}

impl QueryError {
    /// Classifies a plain backend error message.
    ///
    /// Only for backend clients that cannot return a structured code; the
    /// rest of the crate dispatches on the variant.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(USER_NOT_FOUND_MESSAGE) {
            Self::UserNotSynced { message }
        } else {
            Self::Backend { message }
        }
    }

    /// True for the transient provisioning-lag failure.
    pub fn is_sync_lag(&self) -> bool {
        matches!(self, Self::UserNotSynced { .. })
    }
}

/// Backoff schedule: `min(base * 2^attempt, max)` for attempts `0..max_retries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Number of backoff cycles before giving up.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Where a query session sits in the retry cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Query is live.
    Idle,
    /// Query is skipped until the backoff for `attempt` elapses.
    Retrying {
        /// Zero-based attempt being waited on.
        attempt: u32,
    },
    /// Attempts ran out; `error` is the terminal sync error.
    Exhausted {
        /// Last sync-lag error caught.
        error: QueryError,
    },
}

/// What the owner of the query should do with a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Suppress the error, skip the query and re-issue it after `delay`.
    Schedule {
        /// Zero-based attempt being scheduled.
        attempt: u32,
        /// Backoff before re-issuing.
        delay: Duration,
    },
    /// Not a sync-lag error: report it unchanged.
    Surface(QueryError),
    /// Sync lag persisted through every retry: report it as terminal.
    Exhausted(QueryError),
    /// The query is already suppressed or exhausted; nothing to do.
    Ignore,
}

/// Retry bookkeeping for one logical query session.
#[derive(Debug, Clone)]
pub struct SyncRetry {
    policy: RetryPolicy,
    state: RetryState,
    attempt: u32,
}

impl SyncRetry {
    /// Fresh session.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Idle,
            attempt: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Attempts consumed in this session.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True while the query must not be issued.
    pub fn is_suppressed(&self) -> bool {
        matches!(self.state, RetryState::Retrying { .. })
    }

    /// Terminal error once retries are exhausted.
    pub fn sync_error(&self) -> Option<&QueryError> {
        match &self.state {
            RetryState::Exhausted { error } => Some(error),
            _ => None,
        }
    }

    /// Records a successful result. The attempt counter is kept until the
    /// arguments change.
    pub fn on_success(&mut self) {
        if matches!(self.state, RetryState::Retrying { .. }) {
            debug!(attempt = self.attempt, "query settled while a retry was pending");
        }
        self.state = RetryState::Idle;
    }

    /// Decides how to handle a query failure.
    ///
    /// Errors other than sync lag are surfaced in every state, including
    /// while a retry is pending.
    pub fn on_error(&mut self, error: QueryError) -> RetryDecision {
        if !error.is_sync_lag() {
            return RetryDecision::Surface(error);
        }

        match self.state {
            RetryState::Retrying { .. } | RetryState::Exhausted { .. } => {
                return RetryDecision::Ignore;
            }
            RetryState::Idle => {}
        }

        if self.attempt >= self.policy.max_retries {
            warn!(attempts = self.attempt, %error, "user sync retries exhausted");
            self.state = RetryState::Exhausted {
                error: error.clone(),
            };
            return RetryDecision::Exhausted(error);
        }

        let attempt = self.attempt;
        let delay = self.policy.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "user not synced yet, backing off");
        self.state = RetryState::Retrying { attempt };
        RetryDecision::Schedule { attempt, delay }
    }

    /// Backoff elapsed; returns true when the query should be re-issued.
    pub fn on_timer_fired(&mut self) -> bool {
        if !matches!(self.state, RetryState::Retrying { .. }) {
            return false;
        }
        self.attempt += 1;
        self.state = RetryState::Idle;
        true
    }

    /// New arguments start a new session.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.state = RetryState::Idle;
    }
}
