//! Bounded retry with exponential backoff.
//!
//! The loop is explicit: an attempt counter and a classifier deciding
//! whether an error is worth another attempt. SSL failures get one retry,
//! network and transient HTTP failures two; a configured `max_retries`
//! overrides both. Not-found and fatal errors return immediately unless a
//! caller's classifier says otherwise.

use std::thread;
use std::time::Duration;

use crate::error::{ErrorClass, TransportError};

pub const DEFAULT_SSL_RETRIES: u32 = 1;
pub const DEFAULT_NETWORK_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub ssl_retries: u32,
    pub network_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ssl_retries: DEFAULT_SSL_RETRIES,
            network_retries: DEFAULT_NETWORK_RETRIES,
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Per-class defaults unless `max_retries` overrides both.
    pub fn new(max_retries: Option<u32>, backoff: Duration) -> Self {
        match max_retries {
            Some(max) => Self {
                ssl_retries: max,
                network_retries: max,
                backoff,
            },
            None => Self {
                backoff,
                ..Self::default()
            },
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            ssl_retries: 0,
            network_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn retries_for(&self, class: ErrorClass) -> u32 {
        match class {
            ErrorClass::Ssl => self.ssl_retries,
            ErrorClass::Network => self.network_retries,
            ErrorClass::NotFound | ErrorClass::Fatal => 0,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    /// Run `op` under this policy using [`TransportError::class`].
    pub fn run<T>(
        &self,
        label: &str,
        op: impl FnMut() -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        self.run_classified(label, TransportError::class, op)
    }

    /// Run `op`, classifying failures with `classify`.
    ///
    /// Exhausting the budget returns the last error unchanged.
    pub fn run_classified<T>(
        &self,
        label: &str,
        classify: impl Fn(&TransportError) -> ErrorClass,
        mut op: impl FnMut() -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut attempt = 0u32;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let class = classify(&err);
            if attempt >= self.retries_for(class) {
                return Err(err);
            }
            attempt += 1;

            let delay = self.delay(attempt);
            tracing::debug!(
                "retry {attempt}/{} for {label} in {delay:?}: {err}",
                self.retries_for(class)
            );
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn network() -> TransportError {
        TransportError::Network {
            location: "https://example.com/x".to_string(),
            message: "connection reset".to_string(),
        }
    }

    fn ssl() -> TransportError {
        TransportError::Ssl {
            location: "https://example.com/x".to_string(),
            message: "handshake failure".to_string(),
        }
    }

    fn fast(max: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(max, Duration::ZERO)
    }

    #[test]
    fn network_errors_retry_twice_by_default() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast(None).run("x", || {
            calls.set(calls.get() + 1);
            Err(network())
        });
        assert!(matches!(result, Err(TransportError::Network { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn ssl_errors_retry_once_by_default() {
        let calls = Cell::new(0);
        let _: Result<(), _> = fast(None).run("x", || {
            calls.set(calls.get() + 1);
            Err(ssl())
        });
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn max_retries_overrides_both_classes() {
        let calls = Cell::new(0);
        let _: Result<(), _> = fast(Some(4)).run("x", || {
            calls.set(calls.get() + 1);
            Err(ssl())
        });
        assert_eq!(calls.get(), 5);

        let calls = Cell::new(0);
        let _: Result<(), _> = fast(Some(0)).run("x", || {
            calls.set(calls.get() + 1);
            Err(network())
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn not_found_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast(None).run("x", || {
            calls.set(calls.get() + 1);
            Err(TransportError::NotFound {
                location: "k".to_string(),
            })
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn recovers_after_transient_failure() {
        let calls = Cell::new(0);
        let value = fast(None)
            .run("x", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(network())
                } else {
                    Ok(42)
                }
            })
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn custom_classifier_can_retry_not_found() {
        let calls = Cell::new(0);
        let _: Result<(), _> = fast(None).run_classified(
            "x",
            |err| match err.class() {
                ErrorClass::NotFound => ErrorClass::Network,
                other => other,
            },
            || {
                calls.set(calls.get() + 1);
                Err(TransportError::NotFound {
                    location: "k".to_string(),
                })
            },
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(None, Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }
}
