//! Integration tests for the `time` module.
//!
//! These tests drive timers and sleeping tasks through a shared
//! `MockClock`, the way the resilience components use them.

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ratewarden_common::testing::{settle, wait_for_sleepers};
use ratewarden_common::time::{schedule, Clock, MockClock};

/// Timers scheduled for different delays fire in deadline order as virtual
/// time moves forward, independent of scheduling order.
#[tokio::test]
async fn test_timers_fire_in_deadline_order() {
    let clock = MockClock::new();
    let fired = Arc::new(Mutex::new(Vec::new()));

    for delay_ms in [300_u64, 100, 200] {
        let fired = fired.clone();
        schedule(&clock, Duration::from_millis(delay_ms), move || fired.lock().push(delay_ms));
    }
    assert!(wait_for_sleepers(&clock, 3).await);

    clock.advance(Duration::from_millis(150));
    settle().await;
    assert_eq!(*fired.lock(), vec![100]);

    clock.advance(Duration::from_millis(150));
    settle().await;
    assert_eq!(*fired.lock(), vec![100, 200, 300]);
}

/// Many concurrent sleepers are released together by a single large advance
/// and observe the same virtual time afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sleepers_share_timeline() {
    let clock = MockClock::new();
    let start = clock.now();

    let handles: Vec<_> = (1..=5_u64)
        .map(|i| {
            let clock = clock.clone();
            tokio::spawn(async move {
                clock.sleep(Duration::from_millis(i * 10)).await;
                clock.now()
            })
        })
        .collect();

    assert!(wait_for_sleepers(&clock, 5).await);
    clock.advance(Duration::from_secs(1));

    for handle in handles {
        let woke_at = handle.await.unwrap();
        assert_eq!(woke_at.duration_since(start), Duration::from_secs(1));
    }
    assert_eq!(clock.sleeps().len(), 5);
}

/// An auto-advancing clock runs a whole backoff sequence instantly and
/// records every requested delay.
#[tokio::test]
async fn test_auto_advance_records_backoff_sequence() {
    let clock = MockClock::auto_advance();
    let start = clock.now();

    for delay in [100_u64, 200, 400] {
        clock.sleep(Duration::from_millis(delay)).await;
    }

    assert_eq!(clock.now().duration_since(start), Duration::from_millis(700));
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
    );
}
