//! Attempt loop that drives one logical call through its retries.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ratewarden_common::time::{Clock, SystemClock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::metrics::RetryMetrics;
use super::policy::{RetryPolicy, RetryPolicyConfig};
use crate::error::{ApiError, ConfigResult};

/// One logical call submitted for retrying
pub struct RetryRequest<F> {
    /// Correlation id, a v4 UUID unless set explicitly
    pub id: String,
    /// Produces a fresh attempt each time it is called
    pub operation: F,
    /// Human readable label for logs
    pub description: Option<String>,
    /// Caller-supplied data carried along with the request
    pub context: HashMap<String, serde_json::Value>,
}

impl<F> RetryRequest<F> {
    /// Wrap `operation` with a fresh id
    pub fn new(operation: F) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            description: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl<F> fmt::Debug for RetryRequest<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRequest")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Record of a single attempt
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<ApiError>,
    pub delay_before_attempt: Duration,
}

/// Outcome of a call with its full attempt history
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub total_attempts: u32,
    pub total_time: Duration,
    pub attempts: Vec<RetryAttempt>,
}

impl<T> RetryResult<T> {
    /// Collapse into the value or the final error
    ///
    /// # Errors
    ///
    /// Returns the final error of a failed call.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ApiError::network("retry loop finished without an outcome", false)),
        }
    }

    /// Total delay applied between attempts
    pub fn total_delay(&self) -> Duration {
        self.attempts.iter().map(|attempt| attempt.delay_before_attempt).sum()
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// Clones share the policy, and with it the breaker and metrics.
pub struct RetryExecutor<C: Clock = SystemClock> {
    policy: Arc<RetryPolicy<C>>,
}

impl<C: Clock> Clone for RetryExecutor<C> {
    fn clone(&self) -> Self {
        Self { policy: Arc::clone(&self.policy) }
    }
}

impl<C: Clock> fmt::Debug for RetryExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").field("policy", &self.policy).finish()
    }
}

impl RetryExecutor<SystemClock> {
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::error::ConfigError) if `config` is
    /// invalid.
    pub fn new(config: RetryPolicyConfig) -> ConfigResult<Self> {
        Ok(Self::with_policy(Arc::new(RetryPolicy::new(config)?)))
    }
}

impl<C: Clock> RetryExecutor<C> {
    /// Executor sharing an existing policy, breaker and metrics included
    pub const fn with_policy(policy: Arc<RetryPolicy<C>>) -> Self {
        Self { policy }
    }

    /// Policy driving retry decisions
    pub const fn policy(&self) -> &Arc<RetryPolicy<C>> {
        &self.policy
    }

    /// Snapshot of the policy's metrics
    pub fn metrics(&self) -> RetryMetrics {
        self.policy.metrics()
    }

    /// Run `request`, returning the value or the final error
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once the policy stops retrying.
    pub async fn execute<F, Fut, T, E>(&self, request: RetryRequest<F>) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApiError>,
    {
        self.execute_with_result(request).await.into_result()
    }

    /// Run `request`, returning the outcome with per-attempt diagnostics.
    ///
    /// Every failed attempt appears in `attempts`, including those of a call
    /// that eventually succeeds.
    #[instrument(skip_all, fields(request_id = %request.id))]
    pub async fn execute_with_result<F, Fut, T, E>(
        &self,
        mut request: RetryRequest<F>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApiError>,
    {
        let clock = self.policy.clock();
        let started = clock.now();
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut attempt_number: u32 = 1;
        let mut delay = Duration::ZERO;

        if let Some(description) = &request.description {
            debug!(description = %description, "Starting retryable call");
        }

        loop {
            let attempt_started = clock.now();
            let start_time = DateTime::<Utc>::from(clock.system_time());

            let outcome = (request.operation)().await;
            let duration = clock.now().saturating_duration_since(attempt_started);

            match outcome {
                Ok(data) => {
                    attempts.push(RetryAttempt {
                        attempt_number,
                        start_time,
                        duration,
                        success: true,
                        error: None,
                        delay_before_attempt: delay,
                    });
                    self.policy.record_success();
                    if attempt_number > 1 {
                        info!(attempts = attempt_number, "Call succeeded after retry");
                    }
                    return RetryResult {
                        success: true,
                        data: Some(data),
                        error: None,
                        total_attempts: attempt_number,
                        total_time: clock.now().saturating_duration_since(started),
                        attempts,
                    };
                }
                Err(err) => {
                    let error: ApiError = err.into();
                    attempts.push(RetryAttempt {
                        attempt_number,
                        start_time,
                        duration,
                        success: false,
                        error: Some(error.clone()),
                        delay_before_attempt: delay,
                    });
                    self.policy.record_failure(&error);

                    let elapsed = clock.now().saturating_duration_since(started);
                    if !self.policy.should_retry(&error, attempt_number, elapsed) {
                        self.policy.record_operation_failure();
                        warn!(
                            attempts = attempt_number,
                            kind = %error.kind(),
                            error = %error,
                            "Call failed, not retrying"
                        );
                        return RetryResult {
                            success: false,
                            data: None,
                            error: Some(error),
                            total_attempts: attempt_number,
                            total_time: elapsed,
                            attempts,
                        };
                    }

                    delay = self.policy.calculate_delay(attempt_number, Some(&error));
                    warn!(
                        attempt = attempt_number,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    self.policy.record_delay(delay);
                    clock.sleep(delay).await;
                    attempt_number += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the attempt loop on an auto-advancing mock clock.

    use std::sync::atomic::{AtomicU32, Ordering};

    use ratewarden_common::time::MockClock;

    use super::*;
    use crate::resilience::backoff::{BackoffConfig, JitterConfig};
    use crate::resilience::circuit_breaker::CircuitBreakerConfig;

    fn executor(config: RetryPolicyConfig) -> (RetryExecutor<MockClock>, MockClock) {
        let clock = MockClock::auto_advance();
        let policy = RetryPolicy::with_clock(config, clock.clone()).unwrap();
        (RetryExecutor::with_policy(Arc::new(policy)), clock)
    }

    fn fixed(delay_ms: u64, max_attempts: u32) -> RetryPolicyConfig {
        let mut config = RetryPolicyConfig {
            backoff: BackoffConfig::fixed(Duration::from_millis(delay_ms)),
            jitter: JitterConfig::none(),
            circuit_breaker: CircuitBreakerConfig::disabled(),
            ..RetryPolicyConfig::default()
        };
        config.condition.max_attempts = max_attempts;
        config
    }

    /// Validates a first-try success records a single attempt and no delay.
    #[tokio::test]
    async fn test_immediate_success() {
        let (executor, clock) = executor(fixed(100, 3));

        let result = executor
            .execute_with_result(RetryRequest::new(|| async { Ok::<_, ApiError>(7) }))
            .await;

        assert!(result.success);
        assert_eq!(result.data, Some(7));
        assert_eq!(result.total_attempts, 1);
        assert!(clock.sleeps().is_empty());
        assert_eq!(executor.metrics().successful_retries, 1);
    }

    /// Validates recovery after transient failures.
    ///
    /// Assertions:
    /// - Failed attempts stay in the history of a successful call.
    /// - The second and third attempts carry the fixed delay.
    #[tokio::test]
    async fn test_recovers_after_failures() {
        let (executor, clock) = executor(fixed(100, 5));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = executor
            .execute_with_result(RetryRequest::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ApiError::network("connection reset", true))
                    } else {
                        Ok("done")
                    }
                }
            }))
            .await;

        assert!(result.success);
        assert_eq!(result.total_attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.attempts.iter().filter(|a| !a.success).count(), 2);
        assert_eq!(result.attempts[0].delay_before_attempt, Duration::ZERO);
        assert_eq!(result.attempts[1].delay_before_attempt, Duration::from_millis(100));
        assert_eq!(result.total_delay(), Duration::from_millis(200));
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(result.total_time, Duration::from_millis(200));

        let metrics = executor.metrics();
        assert_eq!(metrics.total_attempts, 3);
        assert_eq!(metrics.successful_retries, 1);
        assert_eq!(metrics.failed_retries, 0);
    }

    /// Validates unrecognized errors become retryable transport failures.
    #[tokio::test]
    async fn test_unrecognized_error_normalized() {
        let (executor, _clock) = executor(fixed(100, 3));

        let result = executor
            .execute_with_result(RetryRequest::new(|| async {
                Err::<(), _>(anyhow::anyhow!("socket closed"))
            }))
            .await;

        assert!(!result.success);
        assert_eq!(result.total_attempts, 3);
        assert!(matches!(result.error, Some(ApiError::Network { retryable: true, .. })));
    }

    /// Validates `execute` surfaces only the final error.
    #[tokio::test]
    async fn test_execute_returns_final_error() {
        let (executor, _clock) = executor(fixed(10, 2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let err = executor
            .execute(RetryRequest::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(ApiError::server(500 + u16::try_from(n).unwrap(), "down")) }
            }))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(501));
        assert_eq!(executor.metrics().failed_retries, 1);
    }

    /// Validates request metadata helpers.
    #[test]
    fn test_request_builder() {
        let request = RetryRequest::new(|| async { Ok::<(), ApiError>(()) })
            .with_id("req-1")
            .with_description("set color")
            .with_context("device", "lamp-1");

        assert_eq!(request.id, "req-1");
        assert_eq!(request.description.as_deref(), Some("set color"));
        assert_eq!(request.context["device"], "lamp-1");

        let generated = RetryRequest::new(|| async { Ok::<(), ApiError>(()) });
        assert!(Uuid::parse_str(&generated.id).is_ok());
    }
}
