//! Admission control and retries composed into a single entry point.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ratewarden_common::time::{Clock, SystemClock};
use tracing::info;

use crate::admission::{AdmissionStats, SlidingWindowLimiter};
use crate::config::ResilienceConfig;
use crate::error::{ApiError, ConfigResult};
use crate::resilience::{RetryExecutor, RetryMetrics, RetryPolicy, RetryRequest, RetryResult};

/// Front door for outbound calls.
///
/// Each request is admitted once by the sliding-window limiter; its retries
/// then run inside that admission. Clones share the limiter, breaker and
/// metrics.
pub struct ResilientGateway<C: Clock = SystemClock> {
    limiter: SlidingWindowLimiter<C>,
    executor: RetryExecutor<C>,
}

impl<C: Clock> Clone for ResilientGateway<C> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), executor: self.executor.clone() }
    }
}

impl<C: Clock> fmt::Debug for ResilientGateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientGateway")
            .field("limiter", &self.limiter)
            .field("executor", &self.executor)
            .finish()
    }
}

impl ResilientGateway<SystemClock> {
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::error::ConfigError) if any section of
    /// `config` is invalid.
    pub fn new(config: ResilienceConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> ResilientGateway<C> {
    /// Build a gateway whose limiter and policy share `clock`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::error::ConfigError) if any section of
    /// `config` is invalid.
    pub fn with_clock(config: ResilienceConfig, clock: C) -> ConfigResult<Self> {
        let config = config.with_preset_applied();
        let limiter = SlidingWindowLimiter::with_clock(config.admission, clock.clone())?;
        let policy = RetryPolicy::with_clock(config.retry, clock)?;
        info!(
            max_requests = limiter.config().max_requests,
            window_ms = limiter.config().window.as_millis(),
            preset = ?config.preset,
            "Resilient gateway initialized"
        );
        Ok(Self { limiter, executor: RetryExecutor::with_policy(Arc::new(policy)) })
    }

    /// Admit and run `request`, returning the value or the final error
    ///
    /// # Errors
    ///
    /// [`ApiError::Capacity`] when the admission queue is full, otherwise the
    /// last attempt's error.
    pub async fn execute<F, Fut, T, E>(&self, request: RetryRequest<F>) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApiError>,
    {
        self.limiter.execute(|| self.executor.execute(request)).await
    }

    /// Admit and run `request`, returning per-attempt diagnostics
    ///
    /// # Errors
    ///
    /// [`ApiError::Capacity`] when the admission queue is full. Failures of
    /// the call itself are reported inside the [`RetryResult`].
    pub async fn execute_with_result<F, Fut, T, E>(
        &self,
        request: RetryRequest<F>,
    ) -> Result<RetryResult<T>, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApiError>,
    {
        self.limiter
            .execute(|| async { Ok::<_, ApiError>(self.executor.execute_with_result(request).await) })
            .await
    }

    /// Current load of the admission window
    pub fn stats(&self) -> AdmissionStats {
        self.limiter.stats()
    }

    /// Retry metrics across every request
    pub fn metrics(&self) -> RetryMetrics {
        self.executor.metrics()
    }

    /// Clear the admission window, retry metrics and circuit breaker
    pub fn reset(&self) {
        self.limiter.reset();
        self.executor.policy().reset();
    }

    /// Admission controller in front of the executor
    pub const fn limiter(&self) -> &SlidingWindowLimiter<C> {
        &self.limiter
    }

    /// Executor running admitted requests
    pub const fn executor(&self) -> &RetryExecutor<C> {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratewarden_common::time::MockClock;

    use super::*;
    use crate::admission::AdmissionConfig;
    use crate::resilience::PolicyPreset;

    fn gateway() -> ResilientGateway<MockClock> {
        let config = ResilienceConfig {
            admission: AdmissionConfig::new(2, Duration::from_secs(1), 1),
            preset: Some(PolicyPreset::Testing),
            ..ResilienceConfig::default()
        };
        ResilientGateway::with_clock(config, MockClock::auto_advance()).unwrap()
    }

    /// Validates a call is admitted once and retried inside that admission.
    #[tokio::test]
    async fn test_retries_use_single_admission() {
        let gateway = gateway();
        let mut calls = 0;

        let result = gateway
            .execute_with_result(RetryRequest::new(|| {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(ApiError::server(503, "unavailable"))
                    } else {
                        Ok(attempt)
                    }
                }
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.total_attempts, 3);
        assert_eq!(gateway.stats().current_requests, 1);
        assert_eq!(gateway.metrics().successful_retries, 1);
    }

    /// Validates reset clears both admission and retry state.
    #[tokio::test]
    async fn test_reset() {
        let gateway = gateway();
        let _ = gateway
            .execute(RetryRequest::new(|| async { Err::<(), _>(ApiError::authentication("no")) }))
            .await;
        assert_eq!(gateway.stats().current_requests, 1);
        assert_eq!(gateway.metrics().failed_retries, 1);

        gateway.reset();
        assert_eq!(gateway.stats().current_requests, 0);
        assert_eq!(gateway.metrics(), RetryMetrics::default());
    }
}
