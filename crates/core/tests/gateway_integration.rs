//! Integration tests for the resilient gateway
//!
//! Exercises admission and retries together, built from a loaded
//! configuration.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use ratewarden_common::assert_error_contains;
use ratewarden_common::testing::settle;
use ratewarden_common::time::MockClock;
use ratewarden_core::config::load_from_file;
use ratewarden_core::{
    AdmissionConfig, ApiError, PolicyPreset, ResilienceConfig, ResilientGateway, RetryRequest,
};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

fn gateway(max_requests: usize, max_queue_size: usize) -> (ResilientGateway<MockClock>, MockClock) {
    let clock = MockClock::new();
    let config = ResilienceConfig {
        admission: AdmissionConfig::new(max_requests, Duration::from_secs(1), max_queue_size),
        ..ResilienceConfig::from_preset(PolicyPreset::Testing)
    };
    (ResilientGateway::with_clock(config, clock.clone()).expect("valid config"), clock)
}

/// Validates a gateway built from a TOML file applies both sections.
///
/// # Test Steps
/// 1. Write a config file naming the `testing` preset
/// 2. Load it and build a gateway on the system clock
/// 3. Run a call that fails once with a retryable error
/// 4. Verify the retry and the single admission
#[tokio::test]
async fn test_gateway_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
    writeln!(
        file,
        r#"
        preset = "testing"

        [admission]
        max_requests = 5
        window_ms = 60000
        max_queue_size = 2
        "#
    )
    .expect("write config");

    let config = load_from_file(Some(file.path().to_path_buf())).expect("config loads");
    let gateway = ResilientGateway::new(config).expect("gateway builds");

    let mut calls = 0;
    let result = assert_ok!(
        gateway
            .execute_with_result(RetryRequest::new(|| {
                calls += 1;
                let first = calls == 1;
                async move {
                    if first {
                        Err(ApiError::network("connection reset", true))
                    } else {
                        Ok("ok")
                    }
                }
            }))
            .await
    );

    assert!(result.success);
    assert_eq!(result.total_attempts, 2);
    let stats = gateway.stats();
    assert_eq!(stats.current_requests, 1);
    assert_eq!(stats.max_requests, 5);
    assert_eq!(gateway.metrics().total_attempts, 2);
}

/// Validates capacity rejections surface before any retry logic runs.
///
/// # Test Steps
/// 1. Occupy the single slot with a blocked call and fill the one-deep queue
/// 2. Submit another call and expect a capacity error
/// 3. Verify the rejected call recorded no retry metrics
#[tokio::test]
async fn test_capacity_rejected_before_retry() {
    let (gateway, _clock) = gateway(1, 1);
    let gate = Arc::new(Notify::new());

    let blocked = {
        let gateway = gateway.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            gateway
                .execute(RetryRequest::new(move || {
                    let gate = Arc::clone(&gate);
                    async move {
                        gate.notified().await;
                        Ok::<_, ApiError>(())
                    }
                }))
                .await
        })
    };
    settle().await;

    let waiting = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            gateway.execute(RetryRequest::new(|| async { Ok::<_, ApiError>(()) })).await
        })
    };
    settle().await;
    assert_eq!(gateway.stats().queue_size, 1);

    let rejected = gateway
        .execute_with_result(RetryRequest::new(|| async { Ok::<_, ApiError>(()) }))
        .await;
    assert_error_contains!(rejected, "queue is full");
    assert!(matches!(assert_err!(rejected), ApiError::Capacity { .. }));
    assert_eq!(gateway.metrics().total_attempts, 0);

    gate.notify_waiters();
    blocked.await.expect("task panicked").expect("call succeeded");
    waiting.abort();
}

/// Validates queued requests run after the window slides and then retry
/// normally.
#[tokio::test]
async fn test_queued_request_runs_after_window() {
    let (gateway, clock) = gateway(1, 4);

    gateway
        .execute(RetryRequest::new(|| async { Ok::<_, ApiError>(()) }))
        .await
        .expect("first call admitted");

    let queued = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            gateway
                .execute_with_result(RetryRequest::new(|| async {
                    Err::<(), _>(ApiError::authentication("denied"))
                }))
                .await
        })
    };
    settle().await;
    assert!(!queued.is_finished());
    assert_eq!(gateway.stats().queue_size, 1);

    clock.advance(Duration::from_millis(1001));
    settle().await;

    let result = assert_ok!(queued.await.expect("task panicked"));
    assert!(!result.success);
    assert_eq!(result.total_attempts, 1);
    assert_eq!(gateway.metrics().failed_retries, 1);
    assert_eq!(gateway.metrics().successful_retries, 1);
}
