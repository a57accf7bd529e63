// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        default_backoff, error_backoff, is_retryable_error, retry_api_call, watch_backoff,
        ExponentialBackoff,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(Box::new(kube::error::ErrorResponse {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("HTTP {code}"),
            reason: "Test".to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(30));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(300)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    #[test]
    fn test_error_backoff_never_gives_up() {
        let backoff = error_backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(300));
        assert!(backoff.max_elapsed_time.is_none());
    }

    #[test]
    fn test_watch_backoff_configuration() {
        let backoff = watch_backoff();
        assert_eq!(backoff.initial_interval, Duration::from_secs(1));
        assert!(backoff.max_elapsed_time.is_none());
    }

    #[test]
    fn test_next_backoff_grows_and_caps() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
            None,
            2.0,
            0.0,
        );

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
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
    fn test_reset_restores_initial_interval() {
        let mut backoff = error_backoff();
        backoff.next_backoff();
        backoff.next_backoff();
        assert!(backoff.current_interval > backoff.initial_interval);

        backoff.reset();
        assert_eq!(backoff.current_interval, backoff.initial_interval);
    }

    #[test]
    fn test_exhausted_backoff_returns_none() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(1),
            Some(Duration::ZERO),
            2.0,
            0.0,
        );
        assert!(backoff.next_backoff().is_none());
    }

    #[test]
    fn test_retryable_status_codes() {
        assert!(is_retryable_error(&api_error(429)));
        assert!(is_retryable_error(&api_error(500)));
        assert!(is_retryable_error(&api_error(503)));
        assert!(!is_retryable_error(&api_error(400)));
        assert!(!is_retryable_error(&api_error(404)));
        assert!(!is_retryable_error(&api_error(409)));
    }

    /// Test that service/network errors are retryable
    #[test]
    fn test_service_errors_retryable() {
        let service_error: Box<dyn std::error::Error + Send + Sync> = Box::new(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection failed"),
        );
        assert!(is_retryable_error(&kube::Error::Service(service_error)));
    }

    #[tokio::test]
    async fn test_retry_api_call_fails_fast_on_not_found() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), kube::Error> = retry_api_call(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(api_error(404)) }
            },
            "get secret",
        )
        .await;

        assert!(matches!(result, Err(kube::Error::Api(ae)) if ae.code == 404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_api_call_retries_server_errors() {
        let calls = AtomicUsize::new(0);
        let result = retry_api_call(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(api_error(503))
                    } else {
                        Ok("done")
                    }
                }
            },
            "list deployments",
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
