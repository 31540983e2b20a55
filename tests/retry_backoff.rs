use std::time::Duration;

use soonlist_feed::retry::{QueryError, RetryDecision, RetryPolicy, RetryState, SyncRetry};

fn not_synced(n: u32) -> QueryError {
    QueryError::UserNotSynced {
        message: format!("User not found (try {n})"),
    }
}

#[test]
fn backoff_doubles_and_caps() {
    let policy = RetryPolicy::default();
    let delays: Vec<u64> = (0..8).map(|a| policy.delay_for(a).as_millis() as u64).collect();
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 16_000, 16_000, 16_000]);
    assert_eq!(policy.delay_for(200), Duration::from_millis(16_000));
}

#[test]
fn exhausts_after_max_retries_with_last_error() {
    let mut retry = SyncRetry::new(RetryPolicy::default());

    for attempt in 0..5 {
        match retry.on_error(not_synced(attempt)) {
            RetryDecision::Schedule { attempt: a, delay } => {
                assert_eq!(a, attempt);
                assert_eq!(delay, RetryPolicy::default().delay_for(attempt));
            }
            other => panic!("expected schedule, got {other:?}"),
        }
        assert!(retry.is_suppressed());
        assert!(retry.on_timer_fired());
        assert!(!retry.is_suppressed());
    }

    let last = not_synced(5);
    assert_eq!(retry.on_error(last.clone()), RetryDecision::Exhausted(last.clone()));
    assert_eq!(retry.sync_error(), Some(&last));
    assert_eq!(retry.state(), &RetryState::Exhausted { error: last.clone() });

    // No further retries once exhausted.
    assert_eq!(retry.on_error(not_synced(6)), RetryDecision::Ignore);
    assert!(!retry.on_timer_fired());
    assert_eq!(retry.sync_error(), Some(&last));
}

#[test]
fn other_errors_surface_immediately() {
    let mut retry = SyncRetry::new(RetryPolicy::default());
    let err = QueryError::Backend {
        message: "permission denied".to_string(),
    };
    assert_eq!(retry.on_error(err.clone()), RetryDecision::Surface(err));
    assert_eq!(retry.state(), &RetryState::Idle);
    assert_eq!(retry.attempt(), 0);
}

#[test]
fn errors_while_waiting_are_ignored() {
    let mut retry = SyncRetry::new(RetryPolicy::default());
    assert!(matches!(retry.on_error(not_synced(0)), RetryDecision::Schedule { .. }));
    assert_eq!(retry.on_error(not_synced(1)), RetryDecision::Ignore);
    assert_eq!(retry.state(), &RetryState::Retrying { attempt: 0 });
}

#[test]
fn other_errors_surface_while_waiting_and_after_exhaustion() {
    let mut retry = SyncRetry::new(RetryPolicy {
        max_retries: 1,
        ..RetryPolicy::default()
    });
    let denied = QueryError::Backend {
        message: "Not authorized".to_string(),
    };

    assert!(matches!(retry.on_error(not_synced(0)), RetryDecision::Schedule { .. }));
    assert_eq!(retry.on_error(denied.clone()), RetryDecision::Surface(denied.clone()));
    // The pending backoff is left running.
    assert_eq!(retry.state(), &RetryState::Retrying { attempt: 0 });
    assert!(retry.on_timer_fired());

    assert!(matches!(retry.on_error(not_synced(1)), RetryDecision::Exhausted(_)));
    assert_eq!(retry.on_error(denied.clone()), RetryDecision::Surface(denied));
}

#[test]
fn reset_starts_a_new_session() {
    let mut retry = SyncRetry::new(RetryPolicy {
        max_retries: 1,
        ..RetryPolicy::default()
    });
    assert!(matches!(retry.on_error(not_synced(0)), RetryDecision::Schedule { .. }));
    retry.on_timer_fired();
    assert!(matches!(retry.on_error(not_synced(1)), RetryDecision::Exhausted(_)));

    retry.reset();
    assert_eq!(retry.attempt(), 0);
    assert_eq!(retry.sync_error(), None);
    assert_eq!(
        retry.on_error(not_synced(2)),
        RetryDecision::Schedule {
            attempt: 0,
            delay: Duration::from_millis(1_000)
        }
    );
}

#[test]
fn success_keeps_attempts_until_args_change() {
    let mut retry = SyncRetry::new(RetryPolicy::default());
    retry.on_error(not_synced(0));
    retry.on_timer_fired();
    retry.on_success();
    assert_eq!(retry.state(), &RetryState::Idle);
    assert_eq!(retry.attempt(), 1);
    assert_eq!(
        retry.on_error(not_synced(1)),
        RetryDecision::Schedule {
            attempt: 1,
            delay: Duration::from_millis(2_000)
        }
    );
}

#[test]
fn backend_messages_are_classified_at_the_boundary() {
    assert!(QueryError::from_backend_message("[CONVEX Q(feeds:get)] Uncaught Error: User not found").is_sync_lag());
    assert!(!QueryError::from_backend_message("Not authorized").is_sync_lag());
}
