//! Execution controls: per-invocation timeout, panic containment, and a
//! retry-with-backoff probe wrapper.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ProbeResult;
use crate::error::{ProbeError, ProbeOutcome};
use crate::probe::Probe;

/// How a single bounded invocation ended.
#[derive(Debug)]
pub enum Invocation {
    /// The probe returned a result (success or failure).
    Completed(ProbeResult),

    /// The probe returned an error or panicked.
    Raised(String),

    /// The probe did not finish within its bound.
    TimedOut(Duration),
}

/// Invoke a probe once, bounded by `limit`. Errors and panics are contained.
pub async fn invoke_bounded<T, P>(probe: &P, target: &T, limit: Duration) -> Invocation
where
    T: ?Sized + Sync,
    P: Probe<T> + ?Sized,
{
    let call = AssertUnwindSafe(probe.invoke(target)).catch_unwind();

    match tokio::time::timeout(limit, call).await {
        Ok(Ok(Ok(result))) => Invocation::Completed(result),
        Ok(Ok(Err(err))) => Invocation::Raised(err.to_string()),
        Ok(Err(panic)) => Invocation::Raised(ProbeError::Panicked(panic_message(&*panic)).to_string()),
        Err(_elapsed) => Invocation::TimedOut(limit),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Retry configuration for [`RetryProbe`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Total attempts including the first one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Sum of every delay between attempts: `base * (2^max_retries - 1)`.
    pub fn total_backoff(&self) -> Duration {
        let doublings = 2u64.saturating_pow(self.max_retries).saturating_sub(1);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(doublings))
    }
}

/// Wraps a probe and retries Failure results with exponential backoff.
///
/// Keeps the inner probe's name, so a diagnosis reports the wrapped probe
/// exactly as if it had run once. The last attempt's result is returned.
#[derive(Debug, Clone)]
pub struct RetryProbe<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> RetryProbe<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T, P> Probe<T> for RetryProbe<P>
where
    T: ?Sized + Sync,
    P: Probe<T>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn timeout(&self) -> Option<Duration> {
        // The engine bound covers every attempt plus the backoff between them.
        self.inner.timeout().map(|per_attempt| {
            per_attempt
                .checked_mul(self.policy.attempts())
                .unwrap_or(Duration::MAX)
                .saturating_add(self.policy.total_backoff())
        })
    }

    async fn invoke(&self, target: &T) -> ProbeOutcome {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            let outcome = self.inner.invoke(target).await;
            let failed = match &outcome {
                Ok(result) => !result.is_success(),
                Err(_) => true,
            };

            if !failed || attempt == max_attempts {
                return outcome;
            }

            let delay = self.policy.delay_for(attempt);
            debug!(
                probe = %self.inner.name(),
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Probe failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StatusCode;
    use crate::fakes::ScriptedProbe;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff_base_ms, 500);
    }

    #[test]
    fn test_retry_policy_backoff_doubles() {
        let policy = RetryPolicy::new(3, 100);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_invoke_bounded_completes() {
        let probe = ScriptedProbe::succeeding("health");
        match invoke_bounded(&probe, &(), Duration::from_secs(1)).await {
            Invocation::Completed(result) => assert!(result.is_success()),
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_bounded_contains_errors() {
        let probe = ScriptedProbe::raising("health", "socket closed");
        match invoke_bounded(&probe, &(), Duration::from_secs(1)).await {
            Invocation::Raised(msg) => assert!(msg.contains("socket closed")),
            other => panic!("expected Raised, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_bounded_contains_panics() {
        let probe = ScriptedProbe::panicking("health", "adapter bug");
        match invoke_bounded(&probe, &(), Duration::from_secs(1)).await {
            Invocation::Raised(msg) => assert!(msg.contains("adapter bug")),
            other => panic!("expected Raised, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_bounded_times_out() {
        let probe = ScriptedProbe::hanging("health");
        match invoke_bounded(&probe, &(), Duration::from_millis(50)).await {
            Invocation::TimedOut(limit) => assert_eq!(limit, Duration::from_millis(50)),
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_probe_retries_until_success() {
        let inner = ScriptedProbe::sequence(
            "health",
            vec![
                ProbeResult::failure(StatusCode::ConnectionRefused, "refused"),
                ProbeResult::failure(StatusCode::ConnectionRefused, "refused"),
                ProbeResult::success("ok"),
            ],
        );
        let calls = inner.calls();
        let probe = RetryProbe::new(inner, RetryPolicy::new(2, 10));

        let result = probe.invoke(&()).await.expect("invoke failed");
        assert!(result.is_success());
        assert_eq!(calls.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_probe_returns_last_failure() {
        let inner = ScriptedProbe::failing("health", StatusCode::ConnectionRefused);
        let calls = inner.calls();
        let probe = RetryProbe::new(inner, RetryPolicy::new(1, 10));

        let result = probe.invoke(&()).await.expect("invoke failed");
        assert!(!result.is_success());
        assert_eq!(result.status_code, Some(StatusCode::ConnectionRefused));
        assert_eq!(calls.count(), 2);
    }

    #[tokio::test]
    async fn test_retry_probe_without_retries_runs_once() {
        let inner = ScriptedProbe::failing("health", StatusCode::Http(503));
        let calls = inner.calls();
        let probe = RetryProbe::new(inner, RetryPolicy::new(0, 10));

        let _ = probe.invoke(&()).await;
        assert_eq!(calls.count(), 1);
        assert_eq!(Probe::<()>::name(&probe), "health");
    }

    #[test]
    fn test_retry_probe_timeout_covers_all_attempts() {
        let inner = ScriptedProbe::succeeding("health").with_timeout(Duration::from_millis(100));
        let probe = RetryProbe::new(inner, RetryPolicy::new(2, 10));
        // 3 attempts * 100ms + backoff 10ms + 20ms
        assert_eq!(
            Probe::<()>::timeout(&probe),
            Some(Duration::from_millis(330))
        );
    }

    #[test]
    fn test_total_backoff_matches_per_retry_delays() {
        let policy = RetryPolicy::new(3, 100);
        let summed: Duration = (1..=3).map(|a| policy.delay_for(a)).sum();
        assert_eq!(policy.total_backoff(), summed);
        assert_eq!(RetryPolicy::new(0, 100).total_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_retry_probe_timeout_saturates_for_huge_retry_counts() {
        for retries in [5000, u32::MAX] {
            let inner =
                ScriptedProbe::succeeding("health").with_timeout(Duration::from_secs(10));
            let probe = RetryProbe::new(inner, RetryPolicy::new(retries, 500));
            let bound = Probe::<()>::timeout(&probe).expect("bound is set");
            assert!(bound >= Duration::from_secs(10) * 5000);
        }
        assert_eq!(RetryPolicy::new(u32::MAX, 500).attempts(), u32::MAX);
    }
}
