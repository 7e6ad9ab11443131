//! Admission control for outbound calls.
//!
//! [`SlidingWindowLimiter`] keeps a caller within a provider quota of
//! `max_requests` per moving `window`. Calls that do not fit wait in a
//! bounded FIFO queue; once the queue is full new calls are rejected with
//! [`ApiError::Capacity`](crate::ApiError::Capacity).

pub mod config;
pub mod sliding_window;

pub use config::AdmissionConfig;
pub use sliding_window::{AdmissionStats, SlidingWindowLimiter};
