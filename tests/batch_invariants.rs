use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use proptest::prelude::*;

use soonlist_feed::{
    core::batch::{BatchError, BatchStatus, BatchStore, ImageStatus},
    runtime::ticker::{SweepConfig, spawn_batch_sweeper},
    state::AppState,
    time::clock::ManualClock,
};

fn temp_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("tmp_{i}")).collect()
}

#[test]
fn batch_progresses_to_complete_despite_failures() {
    let store = BatchStore::new()
        .create_batch("b1", temp_ids(3))
        .expect("create");
    assert_eq!(store.get("b1").expect("batch").status, BatchStatus::Uploading);

    let store = store
        .update_image_status("b1", "tmp_0", ImageStatus::Processing, None)
        .expect("processing");
    assert_eq!(store.get("b1").expect("batch").status, BatchStatus::Processing);

    let store = store
        .update_image_status("b1", "tmp_0", ImageStatus::Error, Some("no event found".to_string()))
        .expect("error");
    let store = store.increment_processed("b1", false, 10).expect("inc");
    let store = store.increment_processed("b1", true, 20).expect("inc");
    assert_eq!(store.get("b1").expect("batch").status, BatchStatus::Processing);

    let store = store.increment_processed("b1", true, 30).expect("inc");
    let batch = store.get("b1").expect("batch");
    assert_eq!(batch.status, BatchStatus::Complete);
    assert_eq!(batch.completed_at, Some(30));
    assert_eq!((batch.processed_count, batch.success_count, batch.error_count), (3, 2, 1));
    assert_eq!(batch.images[0].error.as_deref(), Some("no event found"));

    assert_eq!(
        store.increment_processed("b1", true, 40).expect_err("finished"),
        BatchError::Finished("b1".to_string())
    );
}

#[test]
fn reducers_leave_previous_store_untouched() {
    let before = BatchStore::new().create_batch("b1", temp_ids(2)).expect("create");
    let after = before.increment_processed("b1", true, 1).expect("inc");

    assert_eq!(before.get("b1").expect("batch").processed_count, 0);
    assert_eq!(after.get("b1").expect("batch").processed_count, 1);

    let cleared = after.clear_batch("b1");
    assert!(cleared.is_empty());
    assert_eq!(after.len(), 1);
}

#[test]
fn statuses_never_move_backwards() {
    let store = BatchStore::new()
        .create_batch("b1", temp_ids(1))
        .expect("create")
        .update_image_status("b1", "tmp_0", ImageStatus::Success, None)
        .expect("success");

    let err = store
        .update_image_status("b1", "tmp_0", ImageStatus::Processing, None)
        .expect_err("regression");
    assert!(matches!(err, BatchError::ImageRegression { .. }));

    let failed = store.fail_batch("b1", 5).expect("fail");
    assert_eq!(failed.get("b1").expect("batch").status, BatchStatus::Error);
    assert_eq!(
        failed.complete_batch("b1", 6).expect_err("finished"),
        BatchError::Finished("b1".to_string())
    );
}

#[test]
fn unknown_ids_are_errors() {
    let store = BatchStore::new().create_batch("b1", temp_ids(1)).expect("create");
    assert_eq!(
        store.increment_processed("nope", true, 0).expect_err("unknown"),
        BatchError::UnknownBatch("nope".to_string())
    );
    assert!(matches!(
        store.update_image_status("b1", "tmp_9", ImageStatus::Processing, None),
        Err(BatchError::UnknownImage { .. })
    ));
    assert_eq!(
        store.create_batch("b1", temp_ids(1)).expect_err("dupe"),
        BatchError::AlreadyExists("b1".to_string())
    );
}

#[test]
fn sweep_drops_only_old_finished_batches() {
    let store = BatchStore::new()
        .create_batch("done", temp_ids(1))
        .and_then(|s| s.increment_processed("done", true, 1_000))
        .and_then(|s| s.create_batch("running", temp_ids(2)))
        .expect("setup");

    let (kept, removed) = store.sweep_finished(1_500, 1_000);
    assert_eq!(removed, 0);
    assert_eq!(kept.len(), 2);

    let (kept, removed) = store.sweep_finished(2_000, 1_000);
    assert_eq!(removed, 1);
    assert!(kept.get("done").is_none());
    assert!(kept.get("running").is_some());
}

#[test]
fn app_state_resets_on_sign_out() {
    let mut state = AppState::new();
    state.sign_in("user_42");
    state.mark_onboarding_seen();
    state
        .update_batches(|b| b.create_batch("b1", temp_ids(1)))
        .expect("create");

    state
        .update_batches(|b| b.increment_processed("missing", true, 0))
        .expect_err("unknown batch");
    assert_eq!(state.batches().len(), 1);

    state.sign_out();
    assert_eq!(state.user_id(), None);
    assert!(!state.has_seen_onboarding());
    assert!(state.batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sweeper_drops_finished_batches_until_dropped() {
    let clock = Arc::new(ManualClock::new(0));
    let state = Arc::new(Mutex::new(AppState::new()));
    state
        .lock()
        .update_batches(|b| {
            b.create_batch("done", temp_ids(1))?
                .increment_processed("done", true, 0)?
                .create_batch("running", temp_ids(1))
        })
        .expect("setup");

    let sweeper = spawn_batch_sweeper(state.clone(), clock.clone(), SweepConfig::default());

    // Still inside the retention window.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(state.lock().batches().len(), 2);

    clock.set(10 * 60 * 1000);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(state.lock().batches().get("done").is_none());
    assert!(state.lock().batches().get("running").is_some());

    drop(sweeper);
    state
        .lock()
        .update_batches(|b| b.fail_batch("running", 0))
        .expect("fail");
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(state.lock().batches().len(), 1);
}

proptest! {
    #[test]
    fn processed_equals_success_plus_error(size in 1usize..20, outcomes in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut store = BatchStore::new().create_batch("b", temp_ids(size)).expect("create");

        for (i, success) in outcomes.into_iter().enumerate() {
            match store.increment_processed("b", success, i as u64) {
                Ok(next) => store = next,
                Err(err) => prop_assert_eq!(err, BatchError::Finished("b".to_string())),
            }
            let batch = store.get("b").expect("batch");
            prop_assert_eq!(batch.processed_count, batch.success_count + batch.error_count);
            prop_assert!(batch.processed_count <= size);
            prop_assert_eq!(batch.status == BatchStatus::Complete, batch.processed_count == size);
        }
    }
}
