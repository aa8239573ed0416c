//! Single-retry policy for file writes.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::error::StorageError;

/// Retry policy for persistence writes
///
/// A failed write is retried once after `delay`; a second failure is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRetry {
    /// Total attempts, including the first
    max_attempts: u32,
    delay: Duration,
}

impl WriteRetry {
    pub const fn new(delay: Duration) -> Self {
        Self {
            max_attempts: 2,
            delay,
        }
    }

    pub const fn from_millis(delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(delay_ms))
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    pub async fn execute<F, Fut, T>(&self, path: &Path, mut operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(path = %path.display(), attempt, "write succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) if attempt < self.max_attempts => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        delay_ms = self.delay.as_millis() as u64,
                        "write failed, retrying"
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(StorageError::io(path, attempt, err)),
            }
        }
    }
}

impl Default for WriteRetry {
    fn default() -> Self {
        Self::from_millis(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_second_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = WriteRetry::from_millis(1);

        let result = policy
            .execute(Path::new("x"), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(std::io::Error::other("transient"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = WriteRetry::from_millis(1);

        let result: Result<(), _> = policy
            .execute(Path::new("state.json"), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(std::io::Error::other("disk full"))
            })
            .await;

        match result {
            Err(StorageError::Io { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected Io error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
