use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Restart delays for a failed driver (in seconds)
const RESTART_DELAYS: &[u64] = &[5, 10, 20, 30, 60];
const MAX_RESTART_DELAY: u64 = 60;

/// Bounded exponential backoff: after the first attempt, up to `max_retries`
/// further attempts, waiting `base_delay * multiplier^n` before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    /// 1s, 2s, 4s
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), 2)
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier,
        }
    }

    /// Delay before the given retry (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.base_delay.saturating_mul(factor)
    }

    /// Sum of every delay the policy can incur.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_retries)
            .map(|retry| self.delay_for(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects, or
/// the policy's retries are exhausted. The last error is returned as-is.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut retry = 0;

    loop {
        match op().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::info!("Request succeeded after {} retries", retry);
                }
                return Ok(value);
            }
            Err(e) if retry < policy.max_retries && should_retry(&e) => {
                let delay = policy.delay_for(retry);

                tracing::warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {}ms...",
                    retry + 1,
                    policy.max_retries + 1,
                    e,
                    delay.as_millis()
                );

                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run a driver until it returns successfully, restarting it with a capped
/// backoff whenever it fails.
pub async fn supervise<T, E, F, Fut>(name: &str, f: F) -> T
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut restart_count = 0;

    loop {
        match f().await {
            Ok(value) => return value,
            Err(e) => {
                let delay = RESTART_DELAYS
                    .get(restart_count)
                    .copied()
                    .unwrap_or(MAX_RESTART_DELAY);

                tracing::error!(
                    "{} failed: {}. Restarting in {}s (attempt {})...",
                    name,
                    e,
                    delay,
                    restart_count + 1
                );

                tokio::time::sleep(Duration::from_secs(delay)).await;
                restart_count += 1;
            }
        }
    }
}
