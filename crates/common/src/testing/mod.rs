//! Testing utilities and helpers
//!
//! - **[`assertions`]**: assertion macros and helpers for error and timing
//!   checks
//! - **[`async_utils`]**: helpers for letting spawned tasks and virtual-time
//!   timers make progress
//!
//! ## Usage
//!
//! ```rust
//! let result: Result<(), String> = Err("queue is full".to_string());
//! ratewarden_common::assert_error_contains!(result, "full");
//! ```

pub mod assertions;
pub mod async_utils;

// Macros exported with #[macro_export] are available at crate root
pub use assertions::{assert_duration_in_range, assert_sorted};
pub use async_utils::{settle, timeout_ok, wait_for_sleepers, SLEEPER_WAIT};
