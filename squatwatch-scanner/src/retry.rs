use crate::error::{Result, ScanError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often a lookup is re-run, and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(10),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count, no waiting.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Uniformly random wait between `min_wait` and `max_wait`.
    pub fn backoff(&self) -> Duration {
        if self.max_wait <= self.min_wait {
            return self.min_wait;
        }
        let min = self.min_wait.as_millis() as u64;
        let max = self.max_wait.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(ScanError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                let wait = policy.backoff();
                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {:.1}s",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                debug!("{} attempt {}/{}", label, attempt, max_attempts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timeout() -> ScanError {
        ScanError::ElementTimeout {
            what: "#potential-typosquatting".to_string(),
            seconds: 30,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.min_wait, Duration::from_secs(10));
        assert_eq!(policy.max_wait, Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let wait = policy.backoff();
            assert!(wait >= policy.min_wait && wait <= policy.max_wait);
        }
        assert_eq!(RetryPolicy::immediate(3).backoff(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_succeeds_after_retryable_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let value = retry(&RetryPolicy::immediate(3), "lookup", move |attempt| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 { Err(timeout()) } else { Ok(attempt) }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = retry(&RetryPolicy::immediate(3), "lookup", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(timeout())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            ScanError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(source.is_retryable());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = retry(&RetryPolicy::immediate(3), "lookup", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ScanError::ProxyConnection("alert open".to_string()))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ScanError::ProxyConnection(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            min_wait: Duration::from_secs(10),
            max_wait: Duration::from_secs(60),
        };
        let start = tokio::time::Instant::now();

        let _ = retry(&policy, "lookup", |_| async { Err::<(), _>(timeout()) }).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(61));
    }
}
