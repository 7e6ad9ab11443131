//! Clock abstraction for testability
//!
//! Every component that reads "now" or waits goes through [`Clock`], so tests
//! can drive virtual time instead of sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ratewarden_common::time::{Clock, MockClock, SystemClock};
//!
//! // Use system clock in production
//! let clock = SystemClock;
//! let _now = clock.now();
//!
//! // Use mock clock in tests
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Source of time and suspension for resilience components
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis =
            self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// Suspend the current task for `duration`.
    ///
    /// Only the calling task is suspended; other tasks keep running.
    async fn sleep(&self, duration: Duration);
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

#[derive(Debug)]
struct Sleeper {
    deadline: Duration,
    wake: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct MockState {
    elapsed: Duration,
    auto_advance: bool,
    sleepers: Vec<Sleeper>,
    sleeps: Vec<Duration>,
}

impl MockState {
    fn wake_due(&mut self) {
        let elapsed = self.elapsed;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.sleepers.drain(..).partition(|sleeper| sleeper.deadline <= elapsed);
        self.sleepers = pending;
        // Stable, so equal deadlines keep registration order.
        due.sort_by_key(|sleeper| sleeper.deadline);
        for sleeper in due {
            // Receiver gone means the sleeping task was dropped.
            let _ = sleeper.wake.send(());
        }
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same virtual timeline. In the default (manual) mode a
/// [`Clock::sleep`] parks the caller until [`MockClock::advance`] moves
/// virtual time past its deadline. In auto-advance mode every sleep moves
/// virtual time forward by the requested amount and returns at once, which
/// lets whole retry sequences run instantly.
///
/// ```
/// use std::time::Duration;
///
/// use ratewarden_common::time::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.elapsed(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_system_time: SystemTime,
    state: Arc<Mutex<MockState>>,
}

impl MockClock {
    /// Create a manual mock clock at virtual time zero
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            base_system_time: SystemTime::now(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock clock whose sleeps advance virtual time immediately
    #[must_use]
    pub fn auto_advance() -> Self {
        let clock = Self::new();
        clock.state.lock().auto_advance = true;
        clock
    }

    /// Advance the mock clock by a duration, waking every sleeper whose
    /// deadline has been reached
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.elapsed += duration;
        state.wake_due();
    }

    /// Advance the mock clock by a number of milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to an absolute elapsed time
    ///
    /// Moving backwards is allowed; sleepers are only woken when their
    /// deadline is reached.
    pub fn set_elapsed(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.elapsed = duration;
        state.wake_due();
    }

    /// Virtual time elapsed since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Every duration passed to [`Clock::sleep`] so far, in call order
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    /// Number of tasks currently parked in [`Clock::sleep`]
    #[must_use]
    pub fn pending_sleepers(&self) -> usize {
        self.state.lock().sleepers.len()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.state.lock().elapsed
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.state.lock().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let wake = {
            let mut state = self.state.lock();
            state.sleeps.push(duration);
            if state.auto_advance {
                state.elapsed += duration;
                state.wake_due();
                return;
            }
            if duration.is_zero() {
                return;
            }
            let (tx, rx) = oneshot::channel();
            let deadline = state.elapsed + duration;
            state.sleepers.push(Sleeper { deadline, wake: tx });
            rx
        };
        let _ = wake.await;
    }
}
