// SPDX-License-Identifier: MIT OR Apache-2.0
//! Backoff for peer *transport* reconnection only.
//!
//! A substrate-level rejection (`validation-failed`, `immutable`, `exists`,
//! ...) is never retried here — only the underlying connection attempt
//! (dial, handshake) is, and only for the kinds that indicate a transient
//! transport failure.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use substrate_error::{ErrorKind, SubstrateError};
use tracing::{debug, warn};

/// Configuration for reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Overall wall-clock timeout across all attempts.
    #[serde(with = "duration_millis")]
    pub overall_timeout: Duration,
    /// Jitter factor in `[0.0, 1.0]`. 0 = no jitter, 1 = full jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(60),
            jitter_factor: 0.5,
        }
    }
}

/// Serde helper — `Duration` as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Compute the backoff delay for a given zero-indexed attempt number.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let delay_ms = (config.base_delay.as_millis() as u64).saturating_mul(exp);
    let capped_ms = delay_ms.min(config.max_delay.as_millis() as u64);

    let jitter_factor = config.jitter_factor.clamp(0.0, 1.0);
    if jitter_factor > 0.0 && capped_ms > 0 {
        let jitter_range = (capped_ms as f64 * jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };
        Duration::from_millis(capped_ms.saturating_sub(jitter))
    } else {
        Duration::from_millis(capped_ms)
    }
}

/// `true` only for kinds that indicate a transient transport failure; a
/// substrate-level rejection must never be retried here.
pub fn is_retryable(err: &SubstrateError) -> bool {
    matches!(err.kind, ErrorKind::Transport | ErrorKind::Timeout)
}

/// Generic reconnect loop. Calls `connect` up to `max_retries + 1` times
/// with exponential backoff, returning the first successful result.
pub async fn retry_connect<T, F, Fut>(
    config: &RetryConfig,
    mut connect: F,
) -> Result<T, SubstrateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SubstrateError>>,
{
    let start = Instant::now();
    let max_attempts = config.max_retries + 1;

    for attempt in 0..max_attempts {
        if start.elapsed() >= config.overall_timeout {
            warn!(target: "substrate.peer.retry", attempt, "overall reconnect timeout exceeded");
            return Err(SubstrateError::new(
                ErrorKind::Timeout,
                format!("reconnect timed out after {:?}", config.overall_timeout),
            ));
        }

        debug!(target: "substrate.peer.retry", attempt, max_attempts, "connecting");

        match connect().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let is_last = attempt + 1 >= max_attempts;
                if !is_retryable(&err) || is_last {
                    warn!(target: "substrate.peer.retry", error = %err, attempt, "giving up");
                    return Err(err);
                }

                let delay = compute_delay(config, attempt);
                warn!(target: "substrate.peer.retry", error = %err, attempt, delay_ms = delay.as_millis() as u64, "retrying connection");

                let remaining = config.overall_timeout.saturating_sub(start.elapsed());
                if delay > remaining {
                    return Err(SubstrateError::new(
                        ErrorKind::Timeout,
                        format!("reconnect timed out after {:?}", config.overall_timeout),
                    ));
                }
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(SubstrateError::new(
        ErrorKind::Timeout,
        format!("reconnect timed out after {:?}", config.overall_timeout),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_and_respects_cap() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..Default::default()
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 10), config.max_delay);
    }

    #[test]
    fn transport_and_timeout_are_retryable_others_are_not() {
        assert!(is_retryable(&SubstrateError::new(ErrorKind::Transport, "x")));
        assert!(is_retryable(&SubstrateError::new(ErrorKind::Timeout, "x")));
        assert!(!is_retryable(&SubstrateError::validation_failed("x")));
        assert!(!is_retryable(&SubstrateError::hash_mismatch("x")));
    }

    #[tokio::test]
    async fn retry_connect_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
            ..Default::default()
        };
        let result = retry_connect(&config, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SubstrateError::new(ErrorKind::Transport, "dial failed"))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_connect_never_retries_substrate_level_rejection() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let err = retry_connect(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(SubstrateError::validation_failed("bad payload")) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
