//! Bounded exponential backoff for adapter calls. HTTP 4xx responses are non-retryable — callers
//! signal that by returning `Err(Retry::Permanent(_))`.

use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 3;

/// Distinguishes a failure worth retrying from one that won't change on
/// retry (e.g. a 4xx from the upstream).
pub enum RetryError<E> {
    Transient(E),
    Permanent(E),
}

/// Run `f` up to `MAX_ATTEMPTS` times, sleeping `BASE_DELAY * 2^attempt`
/// (capped at `MAX_DELAY`) between transient failures. Returns the last
/// error if every attempt fails, or immediately on a permanent one.
pub async fn with_backoff<T, E, F, Fut>(mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RetryError<E>>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(RetryError::Permanent(e)) => return Err(e),
            Err(RetryError::Transient(e)) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(e);
                }
                let delay = BASE_DELAY.saturating_mul(1 << (attempt - 1)).min(MAX_DELAY);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
