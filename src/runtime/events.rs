//! Views and events published by a feed session.

use crate::{
    core::paginated::PaginationStatus,
    event::Event,
    retry::QueryError,
    types::{EpochMs, FeedQueryArgs},
};

/// Where the visible items came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    /// Nothing to show yet.
    Empty,
    /// Seeded from the offline cache while the live query settles.
    Cache {
        /// Cache record younger than the freshness window.
        fresh: bool,
    },
    /// Settled live query results.
    Live,
}

/// Health of the live query as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing to report.
    Ok,
    /// Backend user record not provisioned yet; retrying.
    SettingUpAccount {
        /// Zero-based attempt being waited on.
        attempt: u32,
    },
    /// Failure to present; terminal when retries ran out.
    Failed(QueryError),
}

/// Latest renderable state of one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    /// Arguments of the current query session.
    pub args: FeedQueryArgs,
    /// Items to render, in server order.
    pub items: Vec<Event>,
    /// Live pagination status.
    pub status: PaginationStatus,
    /// Origin of `items`.
    pub source: ViewSource,
    /// Query health.
    pub sync: SyncStatus,
}

/// Notable transitions, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Items were seeded from the offline cache.
    CacheSeeded {
        /// Number of cached items.
        items: usize,
        /// `lastUpdated` of the cached record.
        last_updated: EpochMs,
    },
    /// A live page set settled.
    LiveSettled {
        /// Number of items.
        items: usize,
    },
    /// The offline cache was overwritten.
    CacheWritten {
        /// Number of items persisted.
        items: usize,
    },
    /// Query arguments changed and a new pagination session started.
    ArgsChanged {
        /// New boundary.
        stable_timestamp: EpochMs,
    },
    /// A sync-lag retry was scheduled.
    RetryScheduled {
        /// Zero-based attempt.
        attempt: u32,
        /// Backoff in milliseconds.
        delay_ms: u64,
    },
    /// The query failed and the failure was surfaced.
    QueryFailed {
        /// True when retries were exhausted.
        terminal: bool,
    },
}
