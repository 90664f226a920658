use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;
use crate::error::TokenError;

/// Fixed-delay retry: one attempt plus up to `max_retries` retries.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay: Duration,
    pub abort_on_remote_error: bool,
}

impl From<&RetryConfig> for RetrySettings {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.delay_ms),
            abort_on_remote_error: config.abort_on_remote_error,
        }
    }
}

impl RetrySettings {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `operation` until it succeeds or the budget is spent.
    ///
    /// Exhaustion is reported as `FatalNoCredential` carrying the last error;
    /// what the caller does with it depends on the drive mode.
    pub async fn run_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, TokenError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TokenError>>,
    {
        let total = self.total_attempts();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < total && !self.is_permanent(&e) => {
                    warn!("Attempt {attempt}/{total} failed: {e}, retrying in {:?}", self.delay);
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("giving up after {attempt} attempt(s): {e}");
                    return Err(TokenError::FatalNoCredential { attempts: attempt, last: Box::new(e) });
                }
            }
        }
    }

    fn is_permanent(&self, e: &TokenError) -> bool {
        self.abort_on_remote_error && matches!(e, TokenError::Remote { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(abort_on_remote_error: bool) -> RetrySettings {
        RetrySettings { max_retries: 3, delay: Duration::from_secs(2), abort_on_remote_error }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = tokio::time::Instant::now();
        let result = settings(false)
            .run_with_retry(|| async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 1 { Err(TokenError::Transport("down".into())) } else { Ok(n) }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = tokio::time::Instant::now();
        let err = settings(false)
            .run_with_retry(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TokenError::Malformed("bad".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert!(matches!(err, TokenError::FatalNoCredential { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_errors_retry_by_default() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _ = settings(false)
            .run_with_retry(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TokenError::Remote { code: 40013, message: "invalid appid".into() })
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_errors_abort_when_configured() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = settings(true)
            .run_with_retry(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TokenError::Remote { code: 40013, message: "invalid appid".into() })
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            TokenError::FatalNoCredential { attempts, last } => {
                assert_eq!(attempts, 1);
                assert_eq!(last.kind(), "remote");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
