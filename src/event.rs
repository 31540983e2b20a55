//! Feed item record as delivered by the backend.

use serde::{Deserialize, Serialize};

use crate::types::{EpochMs, EventId, FeedFilter, UserId};

/// Who can see an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed on discover and on the owner's public profile.
    Public,
    /// Only visible to the owner and people holding the link.
    #[default]
    Private,
}

/// One saved event, in the shape the feed renders and the cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Backend identifier.
    pub id: EventId,
    /// Owner of the event.
    pub user_id: UserId,
    /// Display title.
    pub name: String,
    /// Start in milliseconds since epoch.
    pub start_ms: EpochMs,
    /// End in milliseconds since epoch.
    pub end_ms: EpochMs,
    /// Free-form location text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Hosted image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Visibility of the event.
    #[serde(default)]
    pub visibility: Visibility,
}

impl Event {
    /// Returns true when the event belongs in `filter` for the given boundary.
    ///
    /// Upcoming means "ends at or after the boundary", so an event that is in
    /// progress still counts as upcoming.
    pub fn matches(&self, filter: FeedFilter, boundary: EpochMs) -> bool {
        match filter {
            FeedFilter::Upcoming => self.end_ms >= boundary,
            FeedFilter::Past => self.end_ms < boundary,
        }
    }
}
