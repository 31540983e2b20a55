//! Shared primitive IDs, time units, and feed addressing types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type EpochMs = u64;
/// Backend event identifier.
pub type EventId = String;
/// Backend user identifier.
pub type UserId = String;
/// Client-generated identifier for one submitted image batch.
pub type BatchId = String;
/// Client-generated identifier for one image inside a batch.
pub type TempId = String;

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60 * 1000;

/// Composite key naming one feed (`user_<id>`, `user_<id>_past`, `discover`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    /// Wraps an already-composed feed key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Upcoming events saved by `user_id`.
    pub fn user(user_id: &str) -> Self {
        Self(format!("user_{user_id}"))
    }

    /// Past events saved by `user_id`.
    pub fn user_past(user_id: &str) -> Self {
        Self(format!("user_{user_id}_past"))
    }

    /// Events from the people `user_id` follows.
    pub fn following(user_id: &str) -> Self {
        Self(format!("following_{user_id}"))
    }

    /// Public discover feed.
    pub fn discover() -> Self {
        Self("discover".to_string())
    }

    /// Raw key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time-window filter applied against the stable timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    /// Events ending at or after the boundary.
    Upcoming,
    /// Events that ended before the boundary.
    Past,
}

/// Arguments of one logical feed query session.
///
/// Any change to these starts a new pagination session: cursors from the old
/// arguments are not valid against the new ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedQueryArgs {
    /// Feed being queried, also the offline cache key.
    pub feed_id: FeedId,
    /// Upcoming or past window.
    pub filter: FeedFilter,
    /// Quantized boundary shared by every page of the session.
    pub stable_timestamp: EpochMs,
}
