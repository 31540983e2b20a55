//! Size-bounded, versioned offline cache of the last seen page set per feed.
//!
//! Each feed is stored as one JSON record under `soonlist_feed_cache_<feedId>`
//! and is always replaced wholesale, so the record is the last known good
//! page set and never a merge of two fetches.
//!
//! # Failure policy
//! Nothing in here returns an error to the caller. Storage failures and
//! malformed records are logged and read as "no cache". A record written by a
//! different `schemaVersion` is deleted on read instead of being migrated.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    event::Event,
    persist::{KeyValueStore, PersistResult},
    time::clock::Clock,
    types::{EpochMs, FeedId, MINUTE_MS},
};

/// Version written into every record; bump when [`CachedFeedPage`] or
/// [`Event`] change shape.
pub const CACHE_SCHEMA_VERSION: u32 = 1;
/// Prefix of every cache key in the shared store.
pub const CACHE_KEY_PREFIX: &str = "soonlist_feed_cache_";
/// Largest serialized record the cache will write (5 MiB).
pub const MAX_CACHE_BYTES: usize = 5 * 1024 * 1024;
/// Default freshness window for [`OfflineFeedCache::is_fresh`].
pub const DEFAULT_MAX_AGE_MINUTES: u64 = 60;

/// Persisted snapshot of one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFeedPage {
    /// Feed this page set belongs to.
    pub feed_id: FeedId,
    /// Items in server order.
    pub items: Vec<Event>,
    /// When the record was written.
    pub last_updated: EpochMs,
    /// Stable timestamp the live query used.
    pub last_synced_timestamp: EpochMs,
    /// Number of items in `items`.
    pub total_items: usize,
    /// Record format version.
    pub schema_version: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    schema_version: Option<u32>,
}

/// Cache layout and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix prepended to the feed id to form the storage key.
    pub key_prefix: String,
    /// Byte budget for one serialized record.
    pub max_bytes: usize,
    /// Share of items dropped from the tail per trimming round.
    pub trim_percent: u8,
    /// Version expected on read and written on save.
    pub schema_version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: CACHE_KEY_PREFIX.to_string(),
            max_bytes: MAX_CACHE_BYTES,
            trim_percent: 10,
            schema_version: CACHE_SCHEMA_VERSION,
        }
    }
}

/// Result of a successful [`OfflineFeedCache::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Items persisted.
    pub stored_items: usize,
    /// Items dropped to fit the byte budget.
    pub trimmed_items: usize,
    /// Serialized record length.
    pub bytes: usize,
}

/// Returns true while `page` is younger than `max_age_minutes`.
pub fn is_fresh(page: &CachedFeedPage, now_ms: EpochMs, max_age_minutes: u64) -> bool {
    now_ms.saturating_sub(page.last_updated) < max_age_minutes.saturating_mul(MINUTE_MS)
}

/// Offline feed cache over a shared [`KeyValueStore`].
pub struct OfflineFeedCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl OfflineFeedCache {
    /// Builds a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Storage key for `feed_id`.
    pub fn key_for(&self, feed_id: &FeedId) -> String {
        format!("{}{}", self.config.key_prefix, feed_id)
    }

    /// Replaces the cached page set for `feed_id`.
    ///
    /// Records over the byte budget lose the last `trim_percent` of their
    /// items per round until they fit or no items are left. Returns `None`
    /// if the record could not be written.
    pub fn save(
        &self,
        feed_id: &FeedId,
        items: Vec<Event>,
        synced_timestamp: EpochMs,
    ) -> Option<SaveOutcome> {
        let original_len = items.len();
        let mut page = CachedFeedPage {
            feed_id: feed_id.clone(),
            total_items: items.len(),
            items,
            last_updated: self.clock.now_ms(),
            last_synced_timestamp: synced_timestamp,
            schema_version: self.config.schema_version,
        };

        let encoded = match self.encode_within_budget(&mut page) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(feed = %feed_id, %err, "feed cache: failed to serialize page");
                return None;
            }
        };

        let trimmed_items = original_len - page.items.len();
        if trimmed_items > 0 {
            info!(
                feed = %feed_id,
                trimmed_items,
                kept = page.items.len(),
                "feed cache: trimmed page to fit byte budget"
            );
        }

        if let Err(err) = self.store.set_item(&self.key_for(feed_id), &encoded) {
            warn!(feed = %feed_id, %err, "feed cache: write failed");
            return None;
        }

        debug!(feed = %feed_id, items = page.items.len(), bytes = encoded.len(), "feed cache: saved");
        Some(SaveOutcome {
            stored_items: page.items.len(),
            trimmed_items,
            bytes: encoded.len(),
        })
    }

    /// Reads the cached page set for `feed_id`.
    pub fn load(&self, feed_id: &FeedId) -> Option<CachedFeedPage> {
        let key = self.key_for(feed_id);
        let raw = match self.store.get_item(&key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(feed = %feed_id, %err, "feed cache: read failed");
                return None;
            }
        };

        let probe: VersionProbe = match serde_json::from_str(&raw) {
            Ok(probe) => probe,
            Err(err) => {
                warn!(feed = %feed_id, %err, "feed cache: unreadable record");
                return None;
            }
        };

        if probe.schema_version != Some(self.config.schema_version) {
            info!(
                feed = %feed_id,
                cached = ?probe.schema_version,
                current = self.config.schema_version,
                "feed cache: schema version mismatch, discarding"
            );
            if let Err(err) = self.store.remove_item(&key) {
                warn!(feed = %feed_id, %err, "feed cache: failed to delete stale record");
            }
            return None;
        }

        match serde_json::from_str::<CachedFeedPage>(&raw) {
            Ok(page) => Some(page),
            Err(err) => {
                warn!(feed = %feed_id, %err, "feed cache: malformed record");
                None
            }
        }
    }

    /// Removes the cached page set for `feed_id`.
    pub fn clear(&self, feed_id: &FeedId) {
        if let Err(err) = self.store.remove_item(&self.key_for(feed_id)) {
            warn!(feed = %feed_id, %err, "feed cache: clear failed");
        }
    }

    /// Removes every cached feed; returns how many records were removed.
    ///
    /// Keys outside the cache prefix are left alone.
    pub fn clear_all(&self) -> usize {
        let keys = match self.cache_keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "feed cache: listing keys failed");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.store.remove_item(&key) {
                Ok(()) => removed += 1,
                Err(err) => warn!(key = %key, %err, "feed cache: clear failed"),
            }
        }
        removed
    }

    /// Feed ids that currently have a cached record.
    pub fn cached_feed_ids(&self) -> Vec<FeedId> {
        match self.cache_keys() {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|key| {
                    key.strip_prefix(&self.config.key_prefix)
                        .map(FeedId::new)
                })
                .collect(),
            Err(err) => {
                warn!(%err, "feed cache: listing keys failed");
                Vec::new()
            }
        }
    }

    /// [`is_fresh`] against this cache's clock.
    pub fn is_fresh(&self, page: &CachedFeedPage, max_age_minutes: u64) -> bool {
        is_fresh(page, self.clock.now_ms(), max_age_minutes)
    }

    fn cache_keys(&self) -> PersistResult<Vec<String>> {
        Ok(self
            .store
            .all_keys()?
            .into_iter()
            .filter(|key| key.starts_with(&self.config.key_prefix))
            .collect())
    }

    fn encode_within_budget(&self, page: &mut CachedFeedPage) -> Result<String, serde_json::Error> {
        let mut encoded = serde_json::to_string(page)?;
        while encoded.len() > self.config.max_bytes && !page.items.is_empty() {
            let len = page.items.len();
            let keep = (len * usize::from(100 - self.config.trim_percent.min(100)) / 100).min(len - 1);
            page.items.truncate(keep);
            page.total_items = page.items.len();
            encoded = serde_json::to_string(page)?;
        }
        Ok(encoded)
    }
}
