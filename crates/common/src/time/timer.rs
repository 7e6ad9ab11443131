//! Delayed callbacks driven by a [`Clock`]
//!
//! Provides one-shot timers with cancellation support. The wait goes through
//! the injected clock, so a [`MockClock`](super::MockClock) fires timers when
//! virtual time is advanced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Clock;

/// A timer handle that can be used to cancel a timer
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), fired: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel the timer
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the timer has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check if the callback has run
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Run `callback` once `delay` has elapsed on `clock`.
///
/// Must be called from within a tokio runtime. The callback is skipped if
/// the returned handle is cancelled before the delay elapses.
///
/// ```no_run
/// use std::time::Duration;
///
/// use ratewarden_common::time::{timer::schedule, SystemClock};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = schedule(&SystemClock, Duration::from_secs(1), || {});
///     handle.cancel();
/// }
/// ```
pub fn schedule<C, F>(clock: &C, delay: Duration, callback: F) -> TimerHandle
where
    C: Clock + Clone,
    F: FnOnce() + Send + 'static,
{
    let handle = TimerHandle::new();
    let task_handle = handle.clone();
    let clock = clock.clone();

    tokio::spawn(async move {
        clock.sleep(delay).await;
        if !task_handle.is_cancelled() {
            task_handle.fired.store(true, Ordering::SeqCst);
            callback();
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    //! Unit tests for time::timer.
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::time::MockClock;

    async fn wait_for_sleeper(clock: &MockClock) {
        while clock.pending_sleepers() == 0 {
            tokio::task::yield_now().await;
        }
    }

    /// Validates that a scheduled callback runs once virtual time reaches
    /// the delay.
    ///
    /// Assertions:
    /// - Confirms the counter stays at `0` before the deadline.
    /// - Confirms the counter equals `1` after the deadline.
    #[tokio::test]
    async fn test_schedule_fires_on_advance() {
        let clock = MockClock::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let handle = schedule(&clock, Duration::from_millis(10), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        wait_for_sleeper(&clock).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        clock.advance(Duration::from_millis(10));
        while !handle.has_fired() {
            tokio::task::yield_now().await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!handle.is_cancelled());
    }

    /// Validates that a cancelled timer never runs its callback.
    #[tokio::test]
    async fn test_schedule_cancelled() {
        let clock = MockClock::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let handle = schedule(&clock, Duration::from_millis(50), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        wait_for_sleeper(&clock).await;

        handle.cancel();
        clock.advance(Duration::from_millis(60));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!handle.has_fired());
    }

    /// Validates the real clock path with a short delay.
    #[tokio::test]
    async fn test_schedule_with_system_clock() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        schedule(&crate::time::SystemClock, Duration::from_millis(5), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
