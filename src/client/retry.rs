//! Dial retry policy.
//!
//! Only a dial attempt that timed out is retried, after a fixed sleep.
//! Any other dial error ends the loop at once.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use crate::core::{FprotError, Result};

/// How many times a timed-out dial is retried and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialPolicy {
    /// Additional attempts after the first.
    pub retries: u32,

    /// Pause between attempts.
    pub sleep: Duration,
}

impl Default for DialPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            sleep: Duration::from_secs(1),
        }
    }
}

impl DialPolicy {
    /// Creates a policy with defaults (no retries, 1 second sleep).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of additional attempts.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the pause between attempts.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Returns the total number of attempts the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Returns `true` for errors that count as a dial timeout.
pub fn is_timeout(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::TimedOut
}

/// Runs `dial` until it succeeds, fails with a non-timeout error, or the
/// policy's attempts are used up.
pub async fn retry_dial<F, Fut, T>(policy: &DialPolicy, address: &str, mut dial: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match dial().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_timeout(&error) || attempt >= max_attempts {
            return Err(FprotError::ConnectionFailed {
                address: address.to_string(),
                attempts: attempt,
                message: error.to_string(),
            });
        }

        tracing::warn!(
            address = %address,
            attempt,
            max_attempts,
            sleep_ms = policy.sleep.as_millis() as u64,
            "Dial timed out, retrying"
        );
        tokio::time::sleep(policy.sleep).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn timed_out() -> std::io::Error {
        std::io::Error::new(ErrorKind::TimedOut, "dial timed out")
    }

    #[test]
    fn test_defaults() {
        let policy = DialPolicy::default();
        assert_eq!(policy.retries, 0);
        assert_eq!(policy.sleep, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let policy = DialPolicy::new()
            .with_retries(2)
            .with_sleep(Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<()> = retry_dial(&policy, "10.0.0.1:10200", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(timed_out())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        match result {
            Err(FprotError::ConnectionFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_abort() {
        let policy = DialPolicy::new().with_retries(5);
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_dial(&policy, "127.0.0.1:1", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(ErrorKind::ConnectionRefused, "refused"))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(FprotError::ConnectionFailed { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_timeout() {
        let policy = DialPolicy::new().with_retries(3);
        let calls = AtomicU32::new(0);

        let result = retry_dial(&policy, "127.0.0.1:10200", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(timed_out())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
