//! Time abstractions
//!
//! - **[`clock`]**: the [`Clock`] trait with real and mock implementations
//! - **[`timer`]**: one-shot delayed callbacks driven by a [`Clock`]
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use ratewarden_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now() - start, Duration::from_secs(5));
//! ```

pub mod clock;
pub mod timer;

pub use clock::{Clock, MockClock, SystemClock};
pub use timer::{schedule, TimerHandle};
