// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{http_backoff, is_retryable_http_status, retry_request, ExponentialBackoff};
    use crate::errors::{ConnectionError, DeploymentError};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn http_error(status: u16) -> ConnectionError {
        ConnectionError::Http {
            method: "GET",
            url: "http://om/api".to_string(),
            status,
            body: String::new(),
        }
    }

    fn fast_backoff(max_elapsed: Option<Duration>) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            max_elapsed,
            2.0,
            0.0,
        )
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_http_backoff_configuration() {
        let backoff = http_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(50));
        assert_eq!(backoff.max_interval, Duration::from_secs(10));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(120)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(is_retryable_http_status(status), "{status} should be retryable");
        }
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
            StatusCode::CONFLICT,
        ] {
            assert!(!is_retryable_http_status(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn test_next_backoff_grows_and_caps() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            None,
            2.0,
            0.0,
        );

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));

        backoff.reset();
        assert_eq!(backoff.current_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(1000),
            Duration::from_secs(10),
            None,
            2.0,
            0.1,
        );
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(900) && first <= Duration::from_millis(1100));
    }

    #[test]
    fn test_elapsed_time_exhausts_backoff() {
        let mut backoff = fast_backoff(Some(Duration::ZERO));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[tokio::test]
    async fn test_retry_request_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_request(
            fast_backoff(None),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(http_error(503))
                } else {
                    Ok("done")
                }
            },
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_request_fails_fast_on_client_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_request(
            fast_backoff(None),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(http_error(404))
            },
            "test",
        )
        .await;

        assert!(matches!(result, Err(ConnectionError::Http { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_request_does_not_retry_deployment_errors() {
        let result: Result<(), _> = retry_request(
            fast_backoff(None),
            || async {
                Err(ConnectionError::Deployment(DeploymentError::Json {
                    reason: "eof".to_string(),
                }))
            },
            "test",
        )
        .await;

        assert!(matches!(result, Err(ConnectionError::Deployment(_))));
    }

    #[tokio::test]
    async fn test_retry_request_reports_exhaustion() {
        let result: Result<(), _> = retry_request(
            fast_backoff(Some(Duration::ZERO)),
            || async { Err(http_error(500)) },
            "test",
        )
        .await;

        match result {
            Err(ConnectionError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, ConnectionError::Http { status: 500, .. }));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
