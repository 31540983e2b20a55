//! Client-side feed synchronization for Soonlist: stable time windows,
//! stale-while-revalidate query results, and an offline feed cache.
//!
//! # Examples
//!
//! Stabilizing a paginated query with [`core::paginated::StablePaginatedQuery`]:
//! ```
//! use soonlist_feed::core::paginated::{PageEmission, PaginationStatus, StablePaginatedQuery};
//!
//! let mut query = StablePaginatedQuery::new(2);
//! query.observe(PageEmission::settled(vec!["a", "b"], PaginationStatus::CanLoadMore));
//! assert_eq!(query.load_more(2), Some(4));
//!
//! // The in-flight page does not blank out what is already on screen.
//! let view = query.observe(PageEmission::loading(PaginationStatus::LoadingMore));
//! assert_eq!(view.results, ["a", "b"]);
//! ```
//!
//! Running a feed session over the SQLite-backed offline cache:
//! ```no_run
//! use std::sync::Arc;
//!
//! use soonlist_feed::{
//!     cache::{CacheConfig, OfflineFeedCache},
//!     persist::sqlite::SqliteKvStore,
//!     runtime::{
//!         handle::{spawn_feed_session, SessionConfig},
//!         ticker::spawn_stable_timestamp,
//!     },
//!     time::{clock::SystemClock, stable::TimestampConfig},
//!     types::{FeedFilter, FeedId, FeedQueryArgs},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(SqliteKvStore::open("feed_cache.db").expect("open sqlite"));
//! let cache = Arc::new(OfflineFeedCache::new(store, clock.clone(), CacheConfig::default()));
//! let stamps = spawn_stable_timestamp(clock, TimestampConfig::default());
//!
//! let args = FeedQueryArgs {
//!     feed_id: FeedId::user("42"),
//!     filter: FeedFilter::Upcoming,
//!     stable_timestamp: stamps.current(),
//! };
//! let (handle, mut requests) =
//!     spawn_feed_session(args, Some(cache), Some(stamps.subscribe()), SessionConfig::default());
//! let _first = requests.recv().await;
//! println!("{:?}", handle.view().source);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Offline feed cache.
pub mod cache;
/// Pure stabilization and batch-progress state machines.
pub mod core;
/// Feed item record.
pub mod event;
/// Key-value storage abstraction with in-memory and SQLite backends.
pub mod persist;
/// Sync-lag error taxonomy and backoff retry.
pub mod retry;
/// Feed session runtime, timers, and published views.
pub mod runtime;
/// App-wide client state container.
pub mod state;
/// Clocks and the stable timestamp.
pub mod time;
/// Shared primitive types.
pub mod types;
