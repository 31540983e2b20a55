//! Tokio-driven feed session, timers, and published views.

/// Published views and session events.
pub mod events;
/// Feed session handle and command loop implementation.
pub mod handle;
/// Periodic publishers: stable timestamp and batch sweeps.
pub mod ticker;
/// Cancellable delayed and repeating tasks.
pub mod timer;
