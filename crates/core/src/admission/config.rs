//! Configuration for the sliding-window admission controller.

use std::time::Duration;

use ratewarden_common::duration_millis;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Quota enforced by [`SlidingWindowLimiter`](super::SlidingWindowLimiter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum admissions inside any window
    pub max_requests: usize,
    /// Length of the sliding window
    #[serde(rename = "window_ms", with = "duration_millis")]
    pub window: Duration,
    /// Maximum callers allowed to wait for a slot
    pub max_queue_size: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { max_requests: 60, window: Duration::from_secs(60), max_queue_size: 100 }
    }
}

impl AdmissionConfig {
    /// Create a configuration for `max_requests` per `window`
    #[must_use]
    pub const fn new(max_requests: usize, window: Duration, max_queue_size: usize) -> Self {
        Self { max_requests, window, max_queue_size }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_requests` or `window` is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_requests == 0 {
            return Err(ConfigError::invalid("admission.max_requests", "must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(ConfigError::invalid("admission.window_ms", "must be greater than 0"));
        }
        Ok(())
    }
}
