//! Retry mechanism for handling transient failures in async operations.
//!
//! Delays grow exponentially from `base_interval` but are capped at `max_interval`
//! and carry a random jitter of up to half the base interval, so many pollers
//! failing at the same moment do not retry in lockstep. The total time spent
//! sleeping is bounded by `(max_attempts - 1) * (max_interval + base_interval / 2)`.

use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
	/// Total number of attempts, the first call included
	pub max_attempts: u32,

	/// Delay before the first retry
	pub base_interval: Duration,

	/// Upper bound of the exponential part of the delay
	pub max_interval: Duration,
}

impl RetryConfig {
	/// Creates a configuration whose cap is twice the base interval
	pub fn new(max_attempts: u32, base_interval: Duration) -> Self {
		Self {
			max_attempts,
			base_interval,
			max_interval: base_interval.saturating_mul(2),
		}
	}

	/// Delay to wait after the given (1-based) failed attempt
	pub fn delay_for(&self, failed_attempt: u32) -> Duration {
		let factor = 1u32
			.checked_shl(failed_attempt.saturating_sub(1))
			.unwrap_or(u32::MAX);
		let backoff = self
			.base_interval
			.saturating_mul(factor)
			.min(self.max_interval);

		backoff + self.jitter()
	}

	/// Worst-case total sleep across all attempts
	pub fn max_total_delay(&self) -> Duration {
		let retries = self.max_attempts.max(1) - 1;
		(self.max_interval + self.base_interval / 2).saturating_mul(retries)
	}

	fn jitter(&self) -> Duration {
		let cap = (self.base_interval / 2).as_micros() as u64;
		if cap == 0 {
			return Duration::ZERO;
		}
		Duration::from_micros(rand::rng().random_range(0..=cap))
	}
}

/// Handler for retrying operations with capped, jittered backoff
pub struct WithRetry {
	config: RetryConfig,
}

impl WithRetry {
	/// Creates a new retry handler with custom configuration
	pub fn new(config: RetryConfig) -> Self {
		Self { config }
	}

	/// Attempts an async operation up to `max_attempts` times.
	///
	/// # Returns
	/// * `Ok(T)` - If any attempt succeeds
	/// * `Err(E)` - The error of the last attempt once all attempts fail
	pub async fn attempt<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
	where
		F: Fn() -> Fut + Send + Sync,
		Fut: std::future::Future<Output = Result<T, E>> + Send,
		T: Send,
		E: std::fmt::Display + Send,
	{
		let max_attempts = self.config.max_attempts.max(1);
		let mut attempt = 0;
		loop {
			match operation().await {
				Ok(value) => return Ok(value),
				Err(e) => {
					attempt += 1;
					if attempt >= max_attempts {
						return Err(e);
					}

					let delay = self.config.delay_for(attempt);
					tracing::debug!(
						attempt,
						max_attempts,
						delay_ms = delay.as_millis() as u64,
						"Retrying after error: {}",
						e
					);
					tokio::time::sleep(delay).await;
				}
			}
		}
	}
}
