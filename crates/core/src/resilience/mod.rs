//! Retry and failure-isolation engine.
//!
//! - [`circuit_breaker`]: three-state gate consulted before retrying
//! - [`backoff`]: base delay strategies and jitter
//! - [`policy`]: retry decisions, delay calculation, metrics
//! - [`executor`]: the attempt loop
//! - [`presets`]: named policy bundles
//!
//! ```no_run
//! use ratewarden_core::error::ApiError;
//! use ratewarden_core::resilience::{PolicyPreset, RetryExecutor, RetryRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = RetryExecutor::new(PolicyPreset::Production.config())?;
//! let value = executor
//!     .execute(RetryRequest::new(|| async { Ok::<_, ApiError>(42) }))
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod executor;
pub mod metrics;
pub mod policy;
pub mod presets;

pub use backoff::{BackoffConfig, BackoffKind, CustomBackoff, JitterConfig, JitterKind};
pub use circuit_breaker::{
    BreakerState, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
};
pub use executor::{RetryAttempt, RetryExecutor, RetryRequest, RetryResult};
pub use metrics::RetryMetrics;
pub use policy::{RetryCondition, RetryPolicy, RetryPolicyConfig, RetryPredicate};
pub use presets::PolicyPreset;
