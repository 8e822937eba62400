//! Busy retry.
//!
//! WeChat answers `errcode = -1` ("system busy") when it sheds load. Calls
//! that fail this way are retried up to `max_retry_times` more times with a
//! fixed sleep between attempts; any other error is returned as-is. When the
//! budget is spent the last busy answer surfaces as
//! [`Error::RetryExhausted`].
//!
//! The attempt counter lives on the stack of each call, so concurrent calls
//! through the same client never share or drain each other's budget.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::{Error, Result};

/// errcode WeChat uses for "system busy, try again later".
pub const BUSY_ERRCODE: i64 = -1;

pub const DEFAULT_MAX_RETRY_TIMES: u32 = 5;
pub const DEFAULT_RETRY_SLEEP_MILLIS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = this + 1)
    pub max_retry_times: u32,
    /// Fixed sleep between attempts
    pub retry_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            retry_sleep: Duration::from_millis(DEFAULT_RETRY_SLEEP_MILLIS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry_times: u32, retry_sleep: Duration) -> Self {
        Self {
            max_retry_times,
            retry_sleep,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Run `f`, retrying on busy answers according to `policy`.
///
/// `op` names the call in logs.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries: u32 = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(Error::Wx { code, message }) if code == BUSY_ERRCODE => {
                if retries >= policy.max_retry_times {
                    let attempts = retries + 1;
                    error!(op, attempts, "weixin service busy; retries exhausted");
                    return Err(Error::RetryExhausted {
                        attempts,
                        code,
                        message,
                    });
                }
                retries += 1;
                warn!(
                    op,
                    retry = retries,
                    max = policy.max_retry_times,
                    sleep_ms = policy.retry_sleep.as_millis() as u64,
                    "weixin service busy; retrying"
                );
                sleep(policy.retry_sleep).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> Error {
        Error::Wx {
            code: BUSY_ERRCODE,
            message: "system error".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries_plus_one_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        let res: Result<()> = execute_with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(busy()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match res {
            Err(Error::RetryExhausted { attempts, code, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(code, BUSY_ERRCODE);
            }
            other => panic!("unexpected: {other:?}"),
        }
        // three fixed sleeps, none after the last attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2000), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_busy() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        let res = execute_with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(busy()) } else { Ok(n) } }
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(res, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let res: Result<()> = execute_with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Wx {
                    code: 40013,
                    message: "invalid appid".into(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(res, Err(Error::Wx { code: 40013, .. })));
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let res: Result<()> = execute_with_retry(&RetryPolicy::none(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(busy()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(res, Err(Error::RetryExhausted { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_each_get_full_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                execute_with_retry::<(), _, _>(&policy, "test", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(busy()) }
                })
                .await
            }));
        }
        for t in tasks {
            let res = t.await.expect("join");
            assert!(matches!(res, Err(Error::RetryExhausted { attempts: 4, .. })));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }
}
