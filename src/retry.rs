// ============================================================================
// Exponential Backoff with Full Jitter
// ============================================================================
//
// The single suspension point for batch retries. A policy is immutable and
// shared; each operation owns one RetryState for its lifetime. The cumulative
// wait across one operation never exceeds the policy cap.
//
// ============================================================================

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Result, StoreError};

/// Backoff configuration: base delay, cumulative cap, and jitter bound.
///
/// Pass a policy explicitly to the coordinators, or rely on
/// [`RetryPolicy::default`] (50 ms base, 60 s cap, 250 ms jitter bound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base delay for the exponential term.
    pub base: Duration,
    /// Ceiling on the cumulative wait across one operation.
    pub cap: Duration,
    /// Exclusive upper bound of the uniform jitter added to each wait.
    /// Zero disables jitter.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            cap: Duration::from_millis(60_000),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration, jitter: Duration) -> Self {
        Self { base, cap, jitter }
    }

    pub const fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub const fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Creates the per-operation state for one retry loop.
    pub fn new_state(&self) -> RetryState {
        RetryState::default()
    }

    /// Waits for `base * 2^attempt + rand[0, jitter)`, clamped so the
    /// cumulative wait never exceeds `cap`.
    ///
    /// Fails with [`StoreError::MaxRetriesExceeded`] without sleeping once
    /// the state has already accumulated the full cap.
    pub async fn backoff(&self, state: &mut RetryState) -> Result<()> {
        if state.elapsed >= self.cap {
            return Err(StoreError::MaxRetriesExceeded);
        }

        let exponent = 2u32.checked_pow(state.attempt).unwrap_or(u32::MAX);
        let sleep = self.base.saturating_mul(exponent);
        let wait = sleep.saturating_add(self.sample_jitter());

        // Sleep exactly up to the cap on the final stretch.
        let wait = if state.elapsed + wait > self.cap {
            self.cap - state.elapsed
        } else {
            wait
        };

        debug!(
            attempt = state.attempt,
            wait_ms = wait.as_millis() as u64,
            elapsed_ms = state.elapsed.as_millis() as u64,
            "backing off"
        );
        tokio::time::sleep(wait).await;

        state.elapsed += wait;
        state.attempt += 1;
        Ok(())
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let bound = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

/// Attempt counter and cumulative wait for one operation's retry loop.
///
/// Owned exclusively by the invocation that created it; dropped when the
/// operation returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    elapsed: Duration,
}

impl RetryState {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::ZERO,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn waits_grow_exponentially_without_jitter() {
        let policy = fast_policy();
        let mut state = policy.new_state();

        policy.backoff(&mut state).await.unwrap();
        assert_eq!(state.attempt(), 1);
        assert_eq!(state.elapsed(), Duration::from_millis(10));

        policy.backoff(&mut state).await.unwrap();
        assert_eq!(state.attempt(), 2);
        assert_eq!(state.elapsed(), Duration::from_millis(30));

        policy.backoff(&mut state).await.unwrap();
        assert_eq!(state.attempt(), 3);
        assert_eq!(state.elapsed(), Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_clamped_to_cap() {
        let policy = fast_policy();
        let mut state = policy.new_state();

        // 10 + 20 + 40 = 70; the fourth wait would be 80 and is clamped to 30.
        for _ in 0..4 {
            policy.backoff(&mut state).await.unwrap();
        }
        assert_eq!(state.elapsed(), policy.cap);
        assert_eq!(state.attempt(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_state_fails_without_sleeping() {
        let policy = fast_policy();
        let mut state = policy.new_state();
        for _ in 0..4 {
            policy.backoff(&mut state).await.unwrap();
        }

        let before = tokio::time::Instant::now();
        let err = policy.backoff(&mut state).await.unwrap_err();
        assert!(matches!(err, StoreError::MaxRetriesExceeded));
        assert_eq!(tokio::time::Instant::now(), before);
        assert_eq!(state.elapsed(), policy.cap);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_monotone_and_bounded_with_jitter() {
        let policy = RetryPolicy::new(
            Duration::from_millis(5),
            Duration::from_millis(60),
            Duration::from_millis(8),
        );
        let mut state = policy.new_state();
        let mut previous = Duration::ZERO;

        while policy.backoff(&mut state).await.is_ok() {
            assert!(state.elapsed() >= previous);
            assert!(state.elapsed() <= policy.cap);
            previous = state.elapsed();
        }
        assert_eq!(state.elapsed(), policy.cap);
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_is_the_base_delay() {
        let policy = fast_policy();
        let mut state = policy.new_state();
        let before = tokio::time::Instant::now();
        policy.backoff(&mut state).await.unwrap();
        assert_eq!(tokio::time::Instant::now() - before, policy.base);
    }
}
