//! Custom assertions for testing
//!
//! Provides assertion macros and functions for common testing scenarios.

// These assertions are designed to panic on failure
#![allow(clippy::missing_panics_doc)]

use std::fmt::Debug;
use std::time::Duration;

/// Assert that an error contains a specific substring
///
/// ```
/// let result: Result<(), String> = Err("Connection timeout occurred".to_string());
/// ratewarden_common::assert_error_contains!(result, "timeout");
/// ```
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $substring:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error but got Ok"),
            Err(e) => {
                let error_msg = format!("{}", e);
                assert!(
                    error_msg.contains($substring),
                    "Error message '{}' does not contain '{}'",
                    error_msg,
                    $substring
                );
            }
        }
    };
}

/// Assert that a retry/attempt count matches the expected value
#[macro_export]
macro_rules! assert_retry_count {
    ($actual:expr, $expected:expr) => {
        assert_eq!($actual, $expected, "Expected {} attempts but got {}", $expected, $actual);
    };
}

/// Assert that a duration is within `tolerance` of `expected`
///
/// ```
/// use std::time::Duration;
///
/// use ratewarden_common::testing::assert_duration_in_range;
///
/// assert_duration_in_range(
///     Duration::from_millis(105),
///     Duration::from_millis(100),
///     Duration::from_millis(10),
/// );
/// ```
pub fn assert_duration_in_range(actual: Duration, expected: Duration, tolerance: Duration) {
    let min = expected.saturating_sub(tolerance);
    let max = expected + tolerance;

    assert!(
        actual >= min && actual <= max,
        "Duration {actual:?} not in range [{min:?}, {max:?}]"
    );
}

/// Assert that a sequence is sorted ascending
///
/// Used to check FIFO release order and window timestamp ordering.
pub fn assert_sorted<T>(items: &[T])
where
    T: PartialOrd + Debug,
{
    for window in items.windows(2) {
        assert!(window[0] <= window[1], "Items not sorted: {:?} > {:?}", window[0], window[1]);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::assertions.
    use super::*;

    /// Validates the error substring assertion on a matching error.
    #[test]
    fn test_assert_error_contains() {
        let result: Result<(), String> = Err("capacity exceeded".to_string());
        crate::assert_error_contains!(result, "capacity");
    }

    /// Validates that an `Ok` value fails the error assertion.
    #[test]
    #[should_panic(expected = "Expected error but got Ok")]
    fn test_assert_error_contains_on_ok() {
        let result: Result<(), String> = Ok(());
        crate::assert_error_contains!(result, "anything");
    }

    /// Validates duration tolerance boundaries are inclusive.
    #[test]
    fn test_assert_duration_in_range_bounds() {
        let expected = Duration::from_millis(1000);
        let tolerance = Duration::from_millis(50);
        assert_duration_in_range(Duration::from_millis(950), expected, tolerance);
        assert_duration_in_range(Duration::from_millis(1050), expected, tolerance);
    }

    /// Validates that out-of-order items are rejected.
    #[test]
    #[should_panic(expected = "Items not sorted")]
    fn test_assert_sorted_rejects_unsorted() {
        assert_sorted(&[1, 3, 2]);
    }

    /// Validates the attempt-count assertion.
    #[test]
    fn test_assert_retry_count() {
        crate::assert_retry_count!(3_u32, 3_u32);
    }
}
