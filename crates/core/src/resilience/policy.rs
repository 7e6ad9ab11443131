//! Retry decisions and delay calculation.
//!
//! A [`RetryPolicy`] owns its circuit breaker and metrics. Independent policy
//! instances never share counters.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ratewarden_common::duration_millis;
use ratewarden_common::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backoff::{apply_jitter, base_delay, BackoffConfig, JitterConfig};
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::metrics::RetryMetrics;
use crate::error::{
    ApiError, ConfigError, ConfigResult, ErrorKind, DEFAULT_RETRYABLE_STATUS_CODES,
};

/// Caller-supplied retry decision: `(error, attempt_number, elapsed) -> retry?`
pub type RetryPredicate = Arc<dyn Fn(&ApiError, u32, Duration) -> bool + Send + Sync>;

/// When a failed attempt may be retried
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryCondition {
    /// Attempts allowed in total, including the first
    pub max_attempts: u32,
    /// No further attempts start once this much time has passed
    #[serde(rename = "max_total_time_ms", with = "duration_millis")]
    pub max_total_time: Duration,
    /// Statuses retried in addition to the defaults
    pub retryable_status_codes: Vec<u16>,
    /// Error kinds eligible for retry at all
    pub retryable_error_kinds: Vec<ErrorKind>,
    /// Overrides the kind and status checks when set
    #[serde(skip)]
    pub custom_predicate: Option<RetryPredicate>,
}

impl Default for RetryCondition {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_total_time: Duration::from_secs(60),
            retryable_status_codes: Vec::new(),
            retryable_error_kinds: vec![
                ErrorKind::RateLimit,
                ErrorKind::Network,
                ErrorKind::ServerError,
                ErrorKind::ClientError,
            ],
            custom_predicate: None,
        }
    }
}

impl fmt::Debug for RetryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCondition")
            .field("max_attempts", &self.max_attempts)
            .field("max_total_time", &self.max_total_time)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("retryable_error_kinds", &self.retryable_error_kinds)
            .field("custom_predicate", &self.custom_predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RetryCondition {
    /// Replace the kind and status checks with `predicate`
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ApiError, u32, Duration) -> bool + Send + Sync + 'static,
    {
        self.custom_predicate = Some(Arc::new(predicate));
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero attempt count or total
    /// time.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("condition.max_attempts", "must be greater than 0"));
        }
        if self.max_total_time.is_zero() {
            return Err(ConfigError::invalid(
                "condition.max_total_time_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn status_retryable(&self, status: u16) -> bool {
        DEFAULT_RETRYABLE_STATUS_CODES.contains(&status)
            || self.retryable_status_codes.contains(&status)
    }

    fn error_retryable(&self, error: &ApiError) -> bool {
        if !self.retryable_error_kinds.contains(&error.kind()) {
            return false;
        }
        match error {
            ApiError::RateLimit { .. } => error.can_retry(),
            ApiError::Network { retryable, .. } => *retryable,
            ApiError::Server { status, .. } | ApiError::Client { status, .. } => {
                self.status_retryable(*status)
            }
            ApiError::Authentication { .. } | ApiError::Capacity { .. } => false,
        }
    }
}

/// Full retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Base delay between attempts
    pub backoff: BackoffConfig,
    /// Randomization applied to the base delay
    pub jitter: JitterConfig,
    /// When to stop retrying
    pub condition: RetryCondition,
    /// Breaker consulted before every retry
    pub circuit_breaker: CircuitBreakerConfig,
    /// Disabling metrics leaves circuit breaker bookkeeping in place
    pub enable_metrics: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            jitter: JitterConfig::default(),
            condition: RetryCondition::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            enable_metrics: true,
        }
    }
}

impl RetryPolicyConfig {
    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.backoff.validate()?;
        self.jitter.validate()?;
        self.condition.validate()?;
        self.circuit_breaker.validate()
    }
}

/// Decides whether and when to retry, and keeps retry metrics
pub struct RetryPolicy<C: Clock = SystemClock> {
    config: RetryPolicyConfig,
    breaker: CircuitBreaker<C>,
    metrics: Mutex<RetryMetrics>,
    clock: C,
}

impl<C: Clock> fmt::Debug for RetryPolicy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy<SystemClock> {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn new(config: RetryPolicyConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> RetryPolicy<C> {
    /// Create a policy on a custom clock (useful for testing)
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn with_clock(config: RetryPolicyConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::with_clock(config.circuit_breaker.clone(), clock.clone())?;
        Ok(Self { config, breaker, metrics: Mutex::new(RetryMetrics::default()), clock })
    }
}

impl<C: Clock> RetryPolicy<C> {
    /// Whether attempt `attempt` (1-based), which failed with `error` after
    /// `elapsed` since the call started, should be followed by another.
    pub fn should_retry(&self, error: &ApiError, attempt: u32, elapsed: Duration) -> bool {
        let condition = &self.config.condition;

        if self.config.circuit_breaker.enabled && !self.breaker.can_execute() {
            debug!(attempt, "Retry blocked by open circuit breaker");
            return false;
        }
        if attempt >= condition.max_attempts {
            debug!(attempt, max_attempts = condition.max_attempts, "Retry attempts exhausted");
            return false;
        }
        if elapsed >= condition.max_total_time {
            debug!(
                elapsed_ms = elapsed.as_millis(),
                max_total_time_ms = condition.max_total_time.as_millis(),
                "Retry time budget exhausted"
            );
            return false;
        }

        let retry = match &condition.custom_predicate {
            Some(predicate) => predicate(error, attempt, elapsed),
            None => condition.error_retryable(error),
        };
        debug!(attempt, kind = %error.kind(), retry, "Retry decision");
        retry
    }

    /// Delay to wait after failed attempt `attempt` before the next one.
    ///
    /// A server-mandated wait on a rate-limit error replaces the configured
    /// backoff and is never undercut by jitter.
    pub fn calculate_delay(&self, attempt: u32, error: Option<&ApiError>) -> Duration {
        let backoff = &self.config.backoff;
        let mut rng = rand::thread_rng();

        if let Some(retry_after) = error.and_then(ApiError::server_retry_after) {
            let base = retry_after.min(backoff.max_delay);
            let jittered = apply_jitter(
                &self.config.jitter,
                base,
                backoff.initial_delay,
                backoff.max_delay,
                &mut rng,
            );
            return jittered.max(retry_after);
        }

        let base = base_delay(backoff, attempt, error);
        apply_jitter(&self.config.jitter, base, backoff.initial_delay, backoff.max_delay, &mut rng)
    }

    /// Record a call that finished successfully
    pub fn record_success(&self) {
        self.breaker.record_success();
        if self.config.enable_metrics {
            self.metrics.lock().on_success();
        }
    }

    /// Record a failed attempt
    pub fn record_failure(&self, error: &ApiError) {
        self.breaker.record_failure();
        if self.config.enable_metrics {
            self.metrics.lock().on_attempt_failure(error);
        }
    }

    /// Record a call whose final outcome was failure
    pub fn record_operation_failure(&self) {
        if self.config.enable_metrics {
            self.metrics.lock().on_operation_failure();
        }
    }

    /// Record a delay applied between attempts
    pub fn record_delay(&self, delay: Duration) {
        if self.config.enable_metrics {
            let at = DateTime::<Utc>::from(self.clock.system_time());
            self.metrics.lock().on_delay(delay, at);
        }
    }

    /// Snapshot of the metrics, with the current breaker state
    pub fn metrics(&self) -> RetryMetrics {
        let mut snapshot = self.metrics.lock().clone();
        snapshot.circuit_breaker_state = self.breaker.state();
        snapshot
    }

    /// Clear metrics and reset the circuit breaker
    pub fn reset(&self) {
        *self.metrics.lock() = RetryMetrics::default();
        self.breaker.reset();
    }

    /// Breaker shared by every call made through this policy
    pub const fn circuit_breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Configuration in effect
    pub const fn config(&self) -> &RetryPolicyConfig {
        &self.config
    }

    /// Clock used for delays and timestamps
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}
