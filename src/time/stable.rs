use serde::{Deserialize, Serialize};

use crate::types::{EpochMs, MINUTE_MS};

/// Width of one stable-timestamp grid cell.
pub const STABLE_GRID_MS: u64 = 15 * MINUTE_MS;

/// Grid and polling cadence for the stable timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Grid cell width in milliseconds.
    pub grid_ms: u64,
    /// How often the publisher re-reads the clock.
    pub poll_interval_ms: u64,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            grid_ms: STABLE_GRID_MS,
            poll_interval_ms: MINUTE_MS,
        }
    }
}

/// Floors `now_ms` to the start of its grid cell.
///
/// A zero grid disables quantization.
pub fn stable_timestamp(now_ms: EpochMs, grid_ms: u64) -> EpochMs {
    if grid_ms == 0 {
        return now_ms;
    }
    now_ms - now_ms % grid_ms
}

/// Tracks the last published stable timestamp.
///
/// The published value only moves forward, and only once a whole grid cell
/// has passed since it was last published. Cursors computed against it stay
/// valid for the whole cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableTimestamp {
    grid_ms: u64,
    value: EpochMs,
}

impl StableTimestamp {
    /// Seeds the tracker from the current time.
    pub fn new(now_ms: EpochMs, config: &TimestampConfig) -> Self {
        Self {
            grid_ms: config.grid_ms,
            value: stable_timestamp(now_ms, config.grid_ms),
        }
    }

    /// Currently published boundary.
    pub fn value(&self) -> EpochMs {
        self.value
    }

    /// Re-reads the clock; returns the new boundary if it advanced.
    pub fn poll(&mut self, now_ms: EpochMs) -> Option<EpochMs> {
        let next = stable_timestamp(now_ms, self.grid_ms);
        if next <= self.value || next - self.value < self.grid_ms {
            return None;
        }
        self.value = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_to_quarter_hour() {
        // 10:07:31.250 -> 10:00:00.000
        let now = 10 * 60 * MINUTE_MS + 7 * MINUTE_MS + 31_250;
        assert_eq!(stable_timestamp(now, STABLE_GRID_MS), 10 * 60 * MINUTE_MS);
    }

    #[test]
    fn clock_going_backwards_never_republishes() {
        let cfg = TimestampConfig::default();
        let mut ts = StableTimestamp::new(STABLE_GRID_MS * 4 + 5, &cfg);
        assert_eq!(ts.poll(STABLE_GRID_MS * 2), None);
        assert_eq!(ts.value(), STABLE_GRID_MS * 4);
    }
}
