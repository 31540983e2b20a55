use std::{sync::Arc, time::Duration};

use proptest::prelude::*;

use soonlist_feed::{
    event::{Event, Visibility},
    runtime::ticker::spawn_stable_timestamp,
    time::{
        clock::ManualClock,
        stable::{STABLE_GRID_MS, StableTimestamp, TimestampConfig, stable_timestamp},
    },
    types::{FeedFilter, MINUTE_MS},
};

const DAY_MS: u64 = 24 * 60 * MINUTE_MS;

proptest! {
    #[test]
    fn same_grid_cell_yields_same_value(cell in 0u64..1_000_000, a in 0u64..STABLE_GRID_MS, b in 0u64..STABLE_GRID_MS) {
        let base = cell * STABLE_GRID_MS;
        prop_assert_eq!(stable_timestamp(base + a, STABLE_GRID_MS), base);
        prop_assert_eq!(stable_timestamp(base + a, STABLE_GRID_MS), stable_timestamp(base + b, STABLE_GRID_MS));
    }

    #[test]
    fn polling_never_decreases(start in 0u64..DAY_MS * 365, steps in prop::collection::vec(0u64..(3 * STABLE_GRID_MS), 1..100)) {
        let mut ts = StableTimestamp::new(start, &TimestampConfig::default());
        let mut now = start;
        let mut last = ts.value();
        for step in steps {
            now += step;
            if let Some(next) = ts.poll(now) {
                prop_assert!(next > last);
                prop_assert_eq!(next % STABLE_GRID_MS, 0);
            }
            prop_assert!(ts.value() >= last);
            last = ts.value();
        }
    }
}

#[test]
fn events_keep_their_window_for_the_whole_cell() {
    let cell_start = 1_700_000_100_000u64 - 1_700_000_100_000u64 % STABLE_GRID_MS;
    let ended_early_in_cell = Event {
        id: "evt_1".to_string(),
        user_id: "42".to_string(),
        name: "Standup".to_string(),
        start_ms: cell_start - 30 * MINUTE_MS,
        end_ms: cell_start + 5 * MINUTE_MS,
        location: None,
        image_url: None,
        description: None,
        visibility: Visibility::Public,
    };

    // Ten minutes into the cell the event is over, but the boundary has not moved.
    let boundary = stable_timestamp(cell_start + 10 * MINUTE_MS, STABLE_GRID_MS);
    assert_eq!(boundary, cell_start);
    assert!(ended_early_in_cell.matches(FeedFilter::Upcoming, boundary));
    assert!(!ended_early_in_cell.matches(FeedFilter::Past, boundary));

    let next = stable_timestamp(cell_start + STABLE_GRID_MS, STABLE_GRID_MS);
    assert!(ended_early_in_cell.matches(FeedFilter::Past, next));
    assert!(!ended_early_in_cell.matches(FeedFilter::Upcoming, next));

    let ends_on_boundary = Event {
        end_ms: cell_start,
        ..ended_early_in_cell.clone()
    };
    assert!(ends_on_boundary.matches(FeedFilter::Upcoming, boundary));
}

#[test]
fn minute_polling_advances_exactly_one_step_per_cell() {
    let start = 1_700_000_000_000u64;
    let mut ts = StableTimestamp::new(start, &TimestampConfig::default());
    let mut published = vec![ts.value()];

    for minute in 1..=120u64 {
        if let Some(next) = ts.poll(start + minute * MINUTE_MS) {
            published.push(next);
        }
    }

    assert_eq!(published.len(), 9);
    for pair in published.windows(2) {
        assert_eq!(pair[1] - pair[0], STABLE_GRID_MS);
    }
}

#[tokio::test(start_paused = true)]
async fn publisher_follows_clock_and_stops_on_drop() {
    let clock = Arc::new(ManualClock::new(100 * STABLE_GRID_MS + 3 * MINUTE_MS));
    let handle = spawn_stable_timestamp(clock.clone(), TimestampConfig::default());
    let mut rx = handle.subscribe();
    assert_eq!(handle.current(), 100 * STABLE_GRID_MS);

    // Still inside the same cell: a tick happens but nothing is published.
    clock.advance(5 * MINUTE_MS);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!rx.has_changed().expect("sender alive"));

    clock.advance(10 * MINUTE_MS);
    tokio::time::timeout(Duration::from_secs(120), rx.changed())
        .await
        .expect("tick")
        .expect("changed");
    assert_eq!(*rx.borrow_and_update(), 101 * STABLE_GRID_MS);
    assert_eq!(handle.current(), 101 * STABLE_GRID_MS);

    drop(handle);
    let closed = tokio::time::timeout(Duration::from_secs(120), rx.changed())
        .await
        .expect("publisher task aborted");
    assert!(closed.is_err());
}
