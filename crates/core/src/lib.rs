//! # Ratewarden Core
//!
//! Resilience layer for calls to rate-limited, unreliable remote services.
//!
//! This crate contains:
//! - Sliding-window admission control with a bounded FIFO wait queue
//! - Retry policy with backoff, jitter and error-class-aware decisions
//! - Circuit breaker consulted before every retry
//! - Retry executor that records per-attempt diagnostics
//!
//! ## Architecture Principles
//! - Only depends on `ratewarden-common`
//! - No HTTP or payload handling: operations are opaque async closures
//! - Errors are classified through [`ApiError`] variants
//! - Time is injected through [`Clock`](ratewarden_common::time::Clock), so
//!   tests run on virtual time

pub mod admission;
pub mod config;
pub mod error;
pub mod gateway;
pub mod resilience;

pub use admission::{AdmissionConfig, AdmissionStats, SlidingWindowLimiter};
pub use config::ResilienceConfig;
pub use error::{ApiError, ApiResult, ConfigError, ConfigResult, ErrorKind};
pub use gateway::ResilientGateway;
pub use resilience::{
    BackoffConfig, BackoffKind, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    JitterConfig, JitterKind, PolicyPreset, RetryAttempt, RetryCondition, RetryExecutor,
    RetryMetrics, RetryPolicy, RetryPolicyConfig, RetryRequest, RetryResult,
};
