use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::{
    state::AppState,
    time::{
        clock::Clock,
        stable::{StableTimestamp, TimestampConfig},
    },
    types::{EpochMs, MINUTE_MS},
};

use super::timer::RepeatingTask;

/// Publishes the stable timestamp; dropping it stops the polling timer.
#[derive(Debug)]
pub struct StableTimestampHandle {
    rx: watch::Receiver<EpochMs>,
    _task: RepeatingTask,
}

impl StableTimestampHandle {
    /// Currently published boundary.
    pub fn current(&self) -> EpochMs {
        *self.rx.borrow()
    }

    /// Receiver notified whenever the boundary advances.
    pub fn subscribe(&self) -> watch::Receiver<EpochMs> {
        self.rx.clone()
    }
}

/// Starts polling `clock` every `config.poll_interval_ms`.
pub fn spawn_stable_timestamp(clock: Arc<dyn Clock>, config: TimestampConfig) -> StableTimestampHandle {
    let mut tracker = StableTimestamp::new(clock.now_ms(), &config);
    let (tx, rx) = watch::channel(tracker.value());

    let task = RepeatingTask::spawn(Duration::from_millis(config.poll_interval_ms.max(1)), move || {
        if let Some(next) = tracker.poll(clock.now_ms()) {
            debug!(stable_timestamp = next, "stable timestamp advanced");
            let _ = tx.send(next);
        }
    });

    StableTimestampHandle { rx, _task: task }
}

/// Cadence and retention of finished-batch cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// How often to sweep.
    pub interval_ms: u64,
    /// How long a finished batch stays visible.
    pub retention_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_ms: MINUTE_MS,
            retention_ms: 5 * MINUTE_MS,
        }
    }
}

/// Periodically drops finished batches from `state`.
pub fn spawn_batch_sweeper(
    state: Arc<Mutex<AppState>>,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
) -> RepeatingTask {
    RepeatingTask::spawn(Duration::from_millis(config.interval_ms.max(1)), move || {
        let removed = state.lock().sweep_batches(clock.now_ms(), config.retention_ms);
        if removed > 0 {
            debug!(removed, "swept finished batches");
        }
    })
}
