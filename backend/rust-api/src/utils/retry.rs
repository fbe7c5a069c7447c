use std::time::Duration;

/// Bounded exponential backoff for store-internal compare-and-swap retries.
/// User-facing operations are never retried.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl RetryConfig {
    /// Short backoff for hot documents where many players write at once
    /// (answer records and scores of one quiz share a document).
    pub fn contended() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
            jitter_max: Some(Duration::from_millis(25)),
        }
    }

    fn delay(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) => {
                let jitter_ms = jitter_max.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                backoff + Duration::from_millis(extra)
            }
            None => backoff,
        }
    }
}

/// Retries `f` while `retryable` accepts the error and attempts remain.
pub async fn retry_async_when<F, Fut, T, E, P>(
    config: RetryConfig,
    mut f: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempts_left = config.max_attempts;
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !retryable(&e) {
                    return Err(e);
                }

                tokio::time::sleep(config.delay(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_after_retries() {
        let counter = AtomicUsize::new(0);

        let res: Result<usize, &'static str> = retry_async_when(
            fast(3),
            || async {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("conflict")
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_max_attempts() {
        let counter = AtomicUsize::new(0);

        let res: Result<(), &'static str> = retry_async_when(
            fast(2),
            || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("always conflict")
            },
            |_| true,
        )
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);

        let res: Result<(), &'static str> = retry_async_when(
            fast(5),
            || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("bad path")
            },
            |e| *e == "conflict",
        )
        .await;

        assert_eq!(res, Err("bad path"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
