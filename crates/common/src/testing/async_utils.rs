//! Async testing utilities
//!
//! Resilience components spawn their own timer tasks. These helpers give
//! those tasks a chance to run before a test inspects state.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::time::Duration;

use crate::time::MockClock;

/// Yield to the scheduler enough times for freshly spawned tasks and woken
/// timers to run to their next suspension point.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Real time [`wait_for_sleepers`] allows for tasks to park.
pub const SLEEPER_WAIT: Duration = Duration::from_secs(5);

/// Wait until at least `count` tasks are parked on `clock`.
///
/// Bounded by [`SLEEPER_WAIT`] of real time rather than a number of
/// scheduler turns, so tasks on other worker threads get a chance to park.
/// Returns whether the count was reached.
pub async fn wait_for_sleepers(clock: &MockClock, count: usize) -> bool {
    let parked = async {
        while clock.pending_sleepers() < count {
            tokio::task::yield_now().await;
        }
    };
    timeout_ok(SLEEPER_WAIT, parked).await.is_ok()
}

/// Wait for a future to complete with a real-time timeout
///
/// ```no_run
/// use std::time::Duration;
///
/// use ratewarden_common::testing::timeout_ok;
///
/// #[tokio::main]
/// async fn main() {
///     let value = timeout_ok(Duration::from_millis(100), async { 42 }).await;
///     assert_eq!(value.ok(), Some(42));
/// }
/// ```
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::async_utils.
    use super::*;
    use crate::time::Clock;

    /// Validates that `wait_for_sleepers` observes a parked task.
    #[tokio::test]
    async fn test_wait_for_sleepers() {
        let clock = MockClock::new();
        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(Duration::from_secs(1)).await })
        };

        assert!(wait_for_sleepers(&clock, 1).await);
        clock.advance(Duration::from_secs(1));
        sleeper.await.unwrap();
    }

    /// Validates that `settle` lets a spawned task finish.
    #[tokio::test]
    async fn test_settle_runs_spawned_tasks() {
        let handle = tokio::spawn(async { 7 });
        settle().await;
        assert!(handle.is_finished());
    }

    /// Validates that sleepers parked from worker threads are observed.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_for_sleepers_across_workers() {
        let clock = MockClock::new();
        let sleepers: Vec<_> = (0..8)
            .map(|_| {
                let clock = clock.clone();
                tokio::spawn(async move { clock.sleep(Duration::from_millis(10)).await })
            })
            .collect();

        assert!(wait_for_sleepers(&clock, 8).await);
        clock.advance(Duration::from_millis(10));
        for sleeper in sleepers {
            sleeper.await.unwrap();
        }
    }

    /// Validates timeout behavior for a future that never completes.
    #[tokio::test]
    async fn test_timeout_ok_elapsed() {
        let result = timeout_ok(Duration::from_millis(10), std::future::pending::<()>()).await;
        assert!(result.is_err());
    }
}
