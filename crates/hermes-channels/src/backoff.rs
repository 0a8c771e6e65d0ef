//! Exponential backoff with jitter for adapter transport operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// First retry delay (seconds).
pub const BACKOFF_BASE_SECS: u64 = 1;
/// Delay cap (seconds).
pub const BACKOFF_MAX_SECS: u64 = 60;
/// Attempts before the error is surfaced to the caller.
pub const MAX_ATTEMPTS: u32 = 6;
/// Jitter fraction applied to each delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Run `op` up to [`MAX_ATTEMPTS`] times with exponential backoff.
///
/// Schedule: 1 s → 2 s → 4 s → … capped at 60 s, plus jitter. The final
/// error is returned unchanged.
pub async fn with_backoff<T, E, F, Fut>(label: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt == MAX_ATTEMPTS => return Err(e),
            Err(e) => {
                let total = delay_secs + jitter_secs(delay_secs);
                warn!(
                    %label,
                    attempt,
                    max = MAX_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "operation failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

/// Jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer seconds.
///
/// Derived from the sub-second clock, avoiding a rand dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    u64::from(nanos) % max_jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
