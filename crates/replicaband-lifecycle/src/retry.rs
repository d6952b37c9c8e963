//! Bounded retries with jittered exponential backoff.
//!
//! Every control-plane call runs under a per-call timeout; timeouts and
//! retryable errors are retried with an exponentially growing, jittered
//! delay until the attempt budget is exhausted. Exhaustion surfaces the
//! last error to the caller — never a silent drop.

use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use tracing::warn;

use replicaband_core::ControllerConfig;

use crate::client::{ControlPlaneError, ControlPlaneResult};

/// Retry budget for control-plane calls, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, first included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_backoff: Duration,
    /// Cap on the exponential delay.
    pub max_backoff: Duration,
    /// Timeout applied to each individual attempt.
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts,
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
            call_timeout: config.call_timeout(),
        }
    }

    /// Delay before attempt `attempt + 1`.
    ///
    /// Exponential in the attempt number, capped at `max_backoff`, then
    /// scaled into [0.5x, 1.0x] by a jitter factor hashed from the
    /// delivery token. Deterministic per (token, attempt), so backoff
    /// behavior is testable, while concurrent invocations with distinct
    /// tokens still spread out.
    pub fn backoff_for(&self, token: &str, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.min(16).saturating_sub(1))
            .min(self.max_backoff);

        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        attempt.hash(&mut hasher);
        let jitter = 0.5 + (hasher.finish() % 1000) as f64 / 2000.0;

        exp.mul_f64(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Run `op` under the retry policy.
///
/// `token` seeds the jitter; `op_name` labels diagnostics. A per-attempt
/// timeout converts into `Transient` so blackholed calls and throttling
/// follow the same path. Non-retryable errors return immediately.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    token: &str,
    op_name: &str,
    mut op: F,
) -> ControlPlaneResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlPlaneResult<T>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(ControlPlaneError::Transient(format!(
                "{op_name} timed out after {:?}",
                policy.call_timeout
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff_for(token, attempt);
                warn!(
                    op = %op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "control-plane call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        op = %op_name,
                        attempts = attempt,
                        error = %e,
                        "retry budget exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}
