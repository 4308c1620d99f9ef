//! Retry timing for throttled and transient Graph responses.
//!
//! Graph answers 429 with a `Retry-After` header when a tenant is throttled
//! and occasionally returns 502/503/504 under load. Both are retried with
//! exponential backoff plus jitter, capped at `max_delay_ms`.

use std::time::Duration;
use tracing::{info, warn};

/// Retry timing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// First backoff step; doubles on every retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single wait, including a server `Retry-After`.
    pub max_delay_ms: u64,
    /// Extra random wait, as a fraction of the computed delay.
    pub jitter_factor: f64,
    /// Retries per request and failure kind.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.25,
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Millisecond delays for tests against a mock server.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_factor: 0.25,
            max_retries: 3,
        }
    }

    /// Checks that the delays are usable; returns the reason otherwise.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self { base_delay_ms: 0, .. } => Err("base delay must be positive".into()),
            Self {
                base_delay_ms,
                max_delay_ms,
                ..
            } if max_delay_ms < base_delay_ms => {
                Err(format!("max delay {max_delay_ms}ms is below base delay {base_delay_ms}ms"))
            }
            Self { jitter_factor, .. } if !(0.0..=1.0).contains(jitter_factor) => {
                Err(format!("jitter factor {jitter_factor} is outside 0.0..=1.0"))
            }
            _ => Ok(()),
        }
    }

    /// Seconds from a `Retry-After` header.
    ///
    /// Only the delta-seconds form is understood; Graph does not send dates.
    #[must_use]
    pub fn parse_retry_after(header_value: &str) -> Option<u64> {
        header_value.trim().parse::<u64>().ok()
    }

    /// Exponential delay for `attempt` (0-based): `base * 2^attempt`, capped.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Adds up to `jitter_factor * delay` of random extra wait.
    #[must_use]
    pub fn add_jitter(&self, delay: Duration) -> Duration {
        use rand::Rng;

        let spread = delay.mul_f64(self.jitter_factor);
        if spread.is_zero() {
            return delay;
        }
        delay + rand::thread_rng().gen_range(Duration::ZERO..=spread)
    }

    /// Delay before the next attempt, preferring the server's `Retry-After`.
    #[must_use]
    pub fn delay_for(&self, retry_after_secs: Option<u64>, attempt: u32) -> Duration {
        let delay = match retry_after_secs {
            Some(secs) => {
                let requested = Duration::from_secs(secs);
                let cap = Duration::from_millis(self.max_delay_ms);
                if requested > cap {
                    warn!(
                        retry_after_secs = secs,
                        cap_ms = self.max_delay_ms,
                        "Retry-After exceeds maximum delay, capping"
                    );
                    cap
                } else {
                    requested
                }
            }
            None => self.backoff_delay(attempt),
        };
        self.add_jitter(delay)
    }

    /// Sleeps before retry `attempt`.
    pub async fn wait(&self, retry_after_secs: Option<u64>, attempt: u32) {
        let delay = self.delay_for(retry_after_secs, attempt);
        info!(?delay, attempt, "Waiting before retry");
        tokio::time::sleep(delay).await;
    }
}
