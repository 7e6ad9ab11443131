//! Three-state circuit breaker consulted by the retry policy.
//!
//! All counters and the current state live in one [`BreakerState`] behind a
//! mutex, so a transition and the counter updates that cause it are applied
//! together.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ratewarden_common::duration_millis;
use ratewarden_common::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are blocked until the recovery timeout elapses
    Open,
    /// Probing: calls are allowed, a single failure re-opens the circuit
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// When false the breaker never blocks and never changes state
    pub enabled: bool,
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before an open circuit may be probed
    #[serde(rename = "recovery_timeout_ms", with = "duration_millis")]
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes needed to close the circuit
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_success_threshold: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// A configuration that never blocks
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero thresholds or a zero
    /// recovery timeout on an enabled breaker.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be greater than 0",
            ));
        }
        if self.half_open_success_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.half_open_success_threshold",
                "must be greater than 0",
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "circuit_breaker.recovery_timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Mutable breaker state, owned by the breaker and inspectable as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerState {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures since the last success
    pub failure_count: u32,
    /// Consecutive successes recorded while half-open
    pub half_open_successes: u32,
    /// When the most recent failure was recorded
    pub last_failure_time: Option<Instant>,
    /// When the state last changed
    pub state_changed_at: Instant,
    /// Successes recorded over the breaker's lifetime
    pub total_successes: u64,
    /// Failures recorded over the breaker's lifetime
    pub total_failures: u64,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_successes: 0,
            last_failure_time: None,
            state_changed_at: now,
            total_successes: 0,
            total_failures: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        if self.state != to {
            self.state = to;
            self.state_changed_at = now;
        }
    }
}

/// Snapshot of the breaker for monitoring
pub type CircuitBreakerMetrics = BreakerState;

/// Failure-isolation gate: opens after repeated failures, then probes for
/// recovery.
///
/// Clones share state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
    clock: C,
}

impl<C: Clock + Clone> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self { config: self.config.clone(), state: Arc::clone(&self.state), clock: self.clock.clone() }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &state.state)
            .field("failure_count", &state.failure_count)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker on the system clock
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker on a custom clock (useful for testing)
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();
        Ok(Self { config, state: Arc::new(Mutex::new(BreakerState::new(now))), clock })
    }

    /// Whether a call may proceed.
    ///
    /// An open circuit whose recovery timeout has elapsed since the last
    /// failure moves to half-open here and allows the call.
    pub fn can_execute(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let now = self.clock.now();
                let recovered = state.last_failure_time.map_or(true, |failed_at| {
                    now.saturating_duration_since(failed_at) >= self.config.recovery_timeout
                });
                if recovered {
                    state.half_open_successes = 0;
                    state.transition(CircuitState::HalfOpen, now);
                    info!("Circuit breaker half-open, probing for recovery");
                }
                recovered
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.total_successes += 1;
        if !self.config.enabled {
            return;
        }

        state.failure_count = 0;
        match state.state {
            CircuitState::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.half_open_success_threshold {
                    let now = self.clock.now();
                    state.half_open_successes = 0;
                    state.transition(CircuitState::Closed, now);
                    info!(
                        successes = self.config.half_open_success_threshold,
                        "Circuit breaker closed after successful probes"
                    );
                }
            }
            CircuitState::Closed => {}
            CircuitState::Open => {
                debug!("Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.total_failures += 1;
        if !self.config.enabled {
            return;
        }

        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(now);

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    state.transition(CircuitState::Open, now);
                    warn!(
                        failures = state.failure_count,
                        recovery_timeout_ms = self.config.recovery_timeout.as_millis(),
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.half_open_successes = 0;
                state.transition(CircuitState::Open, now);
                warn!("Circuit breaker re-opened after failure while half-open");
            }
            CircuitState::Open => {}
        }
    }

    /// Current state, without applying the recovery transition
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Copy of the full breaker state
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.state.lock().clone()
    }

    /// Configuration in effect
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Reset to closed with cleared counters
    pub fn reset(&self) {
        let now = self.clock.now();
        *self.state.lock() = BreakerState::new(now);
        info!("Circuit breaker manually reset to closed state");
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for circuit breaker state transitions on a mock clock.

    use ratewarden_common::time::MockClock;

    use super::*;

    fn breaker(failures: u32, recovery_ms: u64, successes: u32) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig {
            enabled: true,
            failure_threshold: failures,
            recovery_timeout: Duration::from_millis(recovery_ms),
            half_open_success_threshold: successes,
        };
        (CircuitBreaker::with_clock(config, clock.clone()).unwrap(), clock)
    }

    /// Validates the breaker starts closed and allows calls.
    #[test]
    fn test_starts_closed() {
        let (breaker, _) = breaker(3, 1000, 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.can_execute());
    }

    /// Validates the circuit opens after the failure threshold and blocks.
    ///
    /// Assertions:
    /// - Stays closed below the threshold.
    /// - Opens exactly at the threshold.
    #[test]
    fn test_opens_after_threshold() {
        let (breaker, _) = breaker(3, 1000, 1);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    /// Validates a success resets the consecutive failure count.
    #[test]
    fn test_success_resets_failures() {
        let (breaker, _) = breaker(3, 1000, 1);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_count, 2);
    }

    /// Validates the open to half-open transition happens on the first check
    /// after the recovery timeout.
    #[test]
    fn test_half_open_after_recovery_timeout() {
        let (breaker, clock) = breaker(1, 1000, 2);
        breaker.record_failure();
        assert!(!breaker.can_execute());

        clock.advance(Duration::from_millis(999));
        assert!(!breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::Open, "no passive timer transition");
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    /// Validates a failure while half-open re-opens the circuit and resets
    /// the probe success count.
    #[test]
    fn test_half_open_failure_reopens() {
        let (breaker, clock) = breaker(1, 500, 3);
        breaker.record_failure();
        clock.advance(Duration::from_millis(500));
        assert!(breaker.can_execute());

        breaker.record_success();
        assert_eq!(breaker.metrics().half_open_successes, 1);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().half_open_successes, 0);
        assert!(!breaker.can_execute());
    }

    /// Validates the circuit closes after consecutive half-open successes.
    #[test]
    fn test_half_open_successes_close() {
        let (breaker, clock) = breaker(2, 100, 2);
        breaker.record_failure();
        breaker.record_failure();
        clock.advance(Duration::from_millis(100));
        assert!(breaker.can_execute());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let metrics = breaker.metrics();
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.total_failures, 2);
        assert_eq!(metrics.total_successes, 2);
    }

    /// Validates the recovery timer restarts from the latest failure.
    #[test]
    fn test_recovery_measured_from_last_failure() {
        let (breaker, clock) = breaker(1, 1000, 1);
        breaker.record_failure();
        clock.advance(Duration::from_millis(600));
        breaker.record_failure();
        clock.advance(Duration::from_millis(600));

        assert!(!breaker.can_execute());
        clock.advance(Duration::from_millis(400));
        assert!(breaker.can_execute());
    }

    /// Validates a disabled breaker never blocks.
    #[test]
    fn test_disabled_never_blocks() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::disabled()).unwrap();
        for _ in 0..100 {
            breaker.record_failure();
        }
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().total_failures, 100);
    }

    /// Validates manual reset.
    #[test]
    fn test_reset() {
        let (breaker, _) = breaker(1, 60_000, 1);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().total_failures, 0);
        assert!(breaker.can_execute());
    }

    /// Validates configuration checks.
    #[test]
    fn test_config_validation() {
        let zero_threshold = CircuitBreakerConfig { failure_threshold: 0, ..Default::default() };
        assert!(zero_threshold.validate().is_err());

        let zero_recovery =
            CircuitBreakerConfig { recovery_timeout: Duration::ZERO, ..Default::default() };
        assert!(zero_recovery.validate().is_err());

        let disabled = CircuitBreakerConfig { failure_threshold: 0, ..CircuitBreakerConfig::disabled() };
        assert!(disabled.validate().is_ok());
    }

    /// Validates state names in logs and serialized metrics.
    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"half_open\"");
    }
}
