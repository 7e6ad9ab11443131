//! Sliding-window admission controller.
//!
//! Admission timestamps are kept sorted in a `VecDeque`; expired entries are
//! purged from the front before every capacity check. Callers that do not
//! fit wait in a FIFO queue and are released by a single pending wake-up
//! scheduled on the injected [`Clock`].

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ratewarden_common::time::{schedule, Clock, SystemClock, TimerHandle};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::config::AdmissionConfig;
use crate::error::{ApiError, ConfigResult};

/// Extra delay past the window edge so the oldest admission has expired when
/// the wake-up runs.
const WAKE_MARGIN: Duration = Duration::from_millis(1);

/// Snapshot of the limiter's load
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionStats {
    /// Admissions inside the current window
    pub current_requests: usize,
    /// Configured quota
    pub max_requests: usize,
    /// Callers waiting for a slot
    pub queue_size: usize,
    /// Configured window length
    pub window: Duration,
    /// `current_requests / max_requests` as a percentage
    pub utilization_percent: f64,
    /// Whether a call submitted now would run without queuing
    pub can_execute_immediately: bool,
    /// Earliest instant a new slot opens (now, if one is free)
    pub next_available_slot: Instant,
}

struct Waiter {
    enqueued_at: Instant,
    admit: oneshot::Sender<()>,
}

#[derive(Default)]
struct WindowState {
    timestamps: VecDeque<Instant>,
    queue: VecDeque<Waiter>,
    wake: Option<TimerHandle>,
    /// Bumped for every scheduled wake-up; a firing wake-up only clears
    /// `wake` if it is still the current one.
    wake_generation: u64,
}

impl WindowState {
    /// Drop admissions older than `window`. Stops at the first live entry.
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Forget queued callers whose future was dropped.
    fn prune_abandoned(&mut self) {
        let before = self.queue.len();
        self.queue.retain(|waiter| !waiter.admit.is_closed());
        let abandoned = before - self.queue.len();
        if abandoned > 0 {
            debug!(abandoned, queue_size = self.queue.len(), "dropped abandoned queued calls");
        }
    }

    fn has_room(&self, max_requests: usize) -> bool {
        self.timestamps.len() < max_requests
    }
}

struct Shared<C: Clock> {
    config: AdmissionConfig,
    clock: C,
    state: Mutex<WindowState>,
}

enum Admission {
    Now,
    Queued(oneshot::Receiver<()>),
}

impl<C: Clock + Clone> Shared<C> {
    /// Capacity check and the matching state change, done under one lock.
    fn admit_or_enqueue(self: &Arc<Self>) -> Result<Admission, ApiError> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.purge(now, self.config.window);
        state.prune_abandoned();

        if state.queue.is_empty() && state.has_room(self.config.max_requests) {
            state.timestamps.push_back(now);
            debug!(
                current_requests = state.timestamps.len(),
                max_requests = self.config.max_requests,
                "admitted immediately"
            );
            return Ok(Admission::Now);
        }

        if state.queue.len() >= self.config.max_queue_size {
            warn!(
                queue_size = state.queue.len(),
                max_queue_size = self.config.max_queue_size,
                "admission queue full, rejecting call"
            );
            return Err(ApiError::capacity(state.queue.len(), self.config.max_queue_size));
        }

        let (admit, admitted) = oneshot::channel();
        state.queue.push_back(Waiter { enqueued_at: now, admit });
        debug!(queue_size = state.queue.len(), "call queued for admission");
        self.drain(&mut state);
        Ok(Admission::Queued(admitted))
    }

    /// Release as many queued callers as fit, then make sure a wake-up is
    /// pending if any remain.
    ///
    /// Callers hold the state lock, which keeps submissions and wake-ups from
    /// draining concurrently.
    fn drain(self: &Arc<Self>, state: &mut WindowState) {
        let now = self.clock.now();
        state.purge(now, self.config.window);

        while state.has_room(self.config.max_requests) {
            let Some(waiter) = state.queue.pop_front() else {
                break;
            };
            // A dropped receiver means the caller gave up; its slot stays free.
            if waiter.admit.send(()).is_ok() {
                state.timestamps.push_back(now);
                debug!(
                    waited_ms = now.saturating_duration_since(waiter.enqueued_at).as_millis(),
                    queue_size = state.queue.len(),
                    "released queued call"
                );
            } else {
                debug!("skipping abandoned queued call");
            }
        }

        if !state.queue.is_empty() {
            self.schedule_wake(state, now);
        }
    }

    fn schedule_wake(self: &Arc<Self>, state: &mut WindowState, now: Instant) {
        if state.wake.is_some() {
            return;
        }

        let delay = state.timestamps.front().map_or(self.config.window, |&oldest| {
            (oldest + self.config.window + WAKE_MARGIN).saturating_duration_since(now)
        });
        debug!(delay_ms = delay.as_millis(), queue_size = state.queue.len(), "scheduling wake-up");

        state.wake_generation = state.wake_generation.wrapping_add(1);
        let generation = state.wake_generation;
        let shared: Weak<Self> = Arc::downgrade(self);
        state.wake = Some(schedule(&self.clock, delay, move || {
            if let Some(shared) = shared.upgrade() {
                let mut state = shared.state.lock();
                if state.wake_generation == generation {
                    state.wake = None;
                }
                shared.drain(&mut state);
            }
        }));
    }

    fn stats(&self) -> AdmissionStats {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.purge(now, self.config.window);
        state.prune_abandoned();

        let current_requests = state.timestamps.len();
        let can_execute_immediately =
            state.queue.is_empty() && state.has_room(self.config.max_requests);
        let next_available_slot = if state.has_room(self.config.max_requests) {
            now
        } else {
            state.timestamps.front().map_or(now, |&oldest| oldest + self.config.window)
        };

        #[allow(clippy::cast_precision_loss)]
        let utilization_percent =
            current_requests as f64 / self.config.max_requests as f64 * 100.0;

        AdmissionStats {
            current_requests,
            max_requests: self.config.max_requests,
            queue_size: state.queue.len(),
            window: self.config.window,
            utilization_percent,
            can_execute_immediately,
            next_available_slot,
        }
    }
}

/// Bounds calls to `max_requests` per sliding `window`.
///
/// Cheap to clone; clones share the same window and queue.
///
/// ```rust
/// use std::time::Duration;
///
/// use ratewarden_core::admission::{AdmissionConfig, SlidingWindowLimiter};
/// use ratewarden_core::ApiError;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = SlidingWindowLimiter::new(AdmissionConfig::new(
///     10,
///     Duration::from_secs(1),
///     100,
/// ))?;
///
/// let value = limiter.execute(|| async { Ok::<_, ApiError>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C: Clock> fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SlidingWindowLimiter")
            .field("config", &self.shared.config)
            .field("window_len", &state.timestamps.len())
            .field("queue_len", &state.queue.len())
            .finish()
    }
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter on the system clock
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn new(config: AdmissionConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> SlidingWindowLimiter<C> {
    /// Create a limiter on a custom clock
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn with_clock(config: AdmissionConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared { config, clock, state: Mutex::new(WindowState::default()) }),
        })
    }

    /// Run `task` once the window has room for it.
    ///
    /// Admitted immediately when no one is waiting and the window has room;
    /// otherwise the caller waits in FIFO order. The task itself runs on the
    /// caller's task, so separately submitted calls execute concurrently.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::Capacity`] without queuing when the queue is
    /// full, otherwise returns the task's own result.
    pub async fn execute<F, Fut, T, E>(&self, task: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ApiError>,
    {
        match self.shared.admit_or_enqueue()? {
            Admission::Now => {}
            Admission::Queued(admitted) => {
                if admitted.await.is_err() {
                    // Only happens when the limiter was dropped while we waited.
                    warn!("admission controller dropped while call was queued");
                    return Err(
                        ApiError::capacity(0, self.shared.config.max_queue_size).into()
                    );
                }
            }
        }
        task().await
    }

    /// Take a slot without queuing. Returns `false` when the call would have
    /// to wait.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.shared.state.lock();
        let now = self.shared.clock.now();
        state.purge(now, self.shared.config.window);
        state.prune_abandoned();
        if state.queue.is_empty() && state.has_room(self.shared.config.max_requests) {
            state.timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Current load of the limiter
    #[must_use]
    pub fn stats(&self) -> AdmissionStats {
        self.shared.stats()
    }

    /// Forget all admissions in the window. Waiting callers are released as
    /// capacity allows.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.timestamps.clear();
        if let Some(wake) = state.wake.take() {
            wake.cancel();
        }
        self.shared.drain(&mut state);
        debug!("admission window reset");
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &AdmissionConfig {
        &self.shared.config
    }
}
