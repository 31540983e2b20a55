//! Pure state machines behind the feed: stabilization and batch progress.

/// Batch-upload progress reducers.
pub mod batch;
/// Stabilized cursor-paginated query results.
pub mod paginated;
/// Stabilized single-value query results.
pub mod stable;
