//! Shared foundation for the Ratewarden crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification and serde helpers
//! - `observability`: tracing bootstrap (pulls in `tracing-subscriber`)
//! - `runtime`: async infrastructure (clock, timers)
//! - `test-utils`: assertion macros and helpers for downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Observability tier
// -----------------------------------------------------------------
#[cfg(feature = "observability")]
pub mod observability;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock, TimerHandle};
#[cfg(feature = "foundation")]
pub use utils::serde::{duration_millis, option_duration_millis};
