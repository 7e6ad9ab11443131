//! Cumulative retry metrics owned by a [`RetryPolicy`](super::RetryPolicy).

use std::time::Duration;

use chrono::{DateTime, Utc};
use ratewarden_common::duration_millis;
use serde::Serialize;

use super::circuit_breaker::CircuitState;
use crate::error::ApiError;

/// Snapshot of a policy's counters.
///
/// `successful_retries` and `failed_retries` count calls by final outcome,
/// not individual attempts. `total_attempts` counts every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryMetrics {
    pub total_attempts: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    /// Number of delays applied between attempts
    pub total_delays: u64,
    #[serde(rename = "total_retry_time_ms", with = "duration_millis")]
    pub total_retry_time: Duration,
    #[serde(rename = "average_retry_delay_ms", with = "duration_millis")]
    pub average_retry_delay: Duration,
    pub circuit_breaker_state: CircuitState,
    pub last_error: Option<String>,
    pub last_retry_timestamp: Option<DateTime<Utc>>,
}

impl Default for RetryMetrics {
    fn default() -> Self {
        Self {
            total_attempts: 0,
            successful_retries: 0,
            failed_retries: 0,
            total_delays: 0,
            total_retry_time: Duration::ZERO,
            average_retry_delay: Duration::ZERO,
            circuit_breaker_state: CircuitState::Closed,
            last_error: None,
            last_retry_timestamp: None,
        }
    }
}

impl RetryMetrics {
    pub(crate) fn on_success(&mut self) {
        self.total_attempts += 1;
        self.successful_retries += 1;
    }

    pub(crate) fn on_attempt_failure(&mut self, error: &ApiError) {
        self.total_attempts += 1;
        self.last_error = Some(error.summary());
    }

    pub(crate) fn on_operation_failure(&mut self) {
        self.failed_retries += 1;
    }

    pub(crate) fn on_delay(&mut self, delay: Duration, at: DateTime<Utc>) {
        self.total_delays += 1;
        self.total_retry_time = self.total_retry_time.saturating_add(delay);
        let count = u32::try_from(self.total_delays).unwrap_or(u32::MAX);
        self.average_retry_delay = self.total_retry_time / count;
        self.last_retry_timestamp = Some(at);
    }

    /// Fraction of finished calls that succeeded, `None` before any call
    /// finished
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.successful_retries + self.failed_retries;
        (finished > 0).then(|| self.successful_retries as f64 / finished as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the running average of applied delays.
    #[test]
    fn test_average_delay() {
        let mut metrics = RetryMetrics::default();
        metrics.on_delay(Duration::from_millis(100), Utc::now());
        metrics.on_delay(Duration::from_millis(300), Utc::now());

        assert_eq!(metrics.total_delays, 2);
        assert_eq!(metrics.total_retry_time, Duration::from_millis(400));
        assert_eq!(metrics.average_retry_delay, Duration::from_millis(200));
        assert!(metrics.last_retry_timestamp.is_some());
    }

    /// Validates outcome counters and the success rate.
    #[test]
    fn test_outcome_counters() {
        let mut metrics = RetryMetrics::default();
        assert_eq!(metrics.success_rate(), None);

        let error = ApiError::server(503, "unavailable");
        metrics.on_attempt_failure(&error);
        metrics.on_attempt_failure(&error);
        metrics.on_operation_failure();
        metrics.on_success();

        assert_eq!(metrics.total_attempts, 3);
        assert_eq!(metrics.failed_retries, 1);
        assert_eq!(metrics.successful_retries, 1);
        assert_eq!(metrics.success_rate(), Some(0.5));
        assert!(metrics.last_error.as_deref().is_some_and(|e| e.starts_with("server-error")));
    }

    /// Validates the serialized snapshot uses millisecond fields.
    #[test]
    fn test_serialize() {
        let mut metrics = RetryMetrics::default();
        metrics.on_delay(Duration::from_millis(250), Utc::now());
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["total_retry_time_ms"], 250);
        assert_eq!(json["circuit_breaker_state"], "closed");
    }
}
