use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times an operation may be attempted and how long to wait between
/// attempts. Backoff grows linearly: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A single attempt, no waiting.
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Page rendering: 3 attempts, 1.5s per attempt number.
    pub const fn render_default() -> Self {
        Self::new(3, Duration::from_millis(1500))
    }

    /// Plain HTTP probes: one retry for transient failures.
    pub const fn http_default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }

    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self, attempt: usize) -> Duration {
        self.base_delay * attempt as u32
    }

    /// Run `op` until it succeeds, `should_retry` rejects the error, or the
    /// attempt budget is spent. `on_retry` sees (attempt, error, delay) before
    /// each sleep.
    pub async fn run<T, E, F, Fut, R, N>(
        &self,
        mut op: F,
        should_retry: R,
        mut on_retry: N,
    ) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        N: FnMut(usize, &E, Duration),
    {
        let max = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max || !should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.backoff(attempt);
                    debug!("Attempt {}/{} failed, retrying in {:?}", attempt, max, delay);
                    on_retry(attempt, &err, delay);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::render_default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1500));
        assert_eq!(policy.backoff(2), Duration::from_millis(3000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4500));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut retries = Vec::new();

        let result: Result<&str, String> = RetryPolicy::render_default()
            .run(
                move |attempt| {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        if attempt < 3 {
                            Err(format!("attempt {} failed", attempt))
                        } else {
                            Ok("rendered")
                        }
                    }
                },
                |_| true,
                |attempt, _err, delay| retries.push((attempt, delay)),
            )
            .await;

        assert_eq!(result, Ok("rendered"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            retries,
            vec![
                (1, Duration::from_millis(1500)),
                (2, Duration::from_millis(3000))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let result: Result<(), String> = RetryPolicy::new(2, Duration::from_millis(10))
            .run(
                |attempt| async move { Err(format!("boom {}", attempt)) },
                |_| true,
                |_, _, _| {},
            )
            .await;

        assert_eq!(result, Err("boom 2".to_string()));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), &str> = RetryPolicy::new(5, Duration::ZERO)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal") }
                },
                |_| false,
                |_, _, _| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
