use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Retries `attempt` forever with a fixed delay between tries, logging a
/// `reconnect`-style span on each retry. Used by the RPC client's
/// connection loop (spec §4.2: "automatic reconnect/backoff (5s)") — a
/// fixed interval, not the `backoff` crate's exponential variant.
pub async fn retry_with_fixed_backoff<F, Fut, T, E>(
    operation_name: &str,
    delay: Duration,
    mut attempt: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(operation_name, attempts, "recovered after retry");
                }
                return value;
            }
            Err(err) => {
                warn!(operation_name, attempts, %err, "operation failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_fixed_backoff("test-op", Duration::from_millis(1), || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("not yet")
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
