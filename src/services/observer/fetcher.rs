//! Bounded, jittered retry around a single block fetch.

use std::{future::Future, time::Duration};

use crate::utils::{RetryConfig, WithRetry};

/// Calls `fetch_fn(height)` until it succeeds or `max_attempts` calls have failed.
///
/// Waits between attempts are capped at twice `base_interval` plus a jitter of at
/// most half of it, so the total wait never exceeds
/// `(max_attempts - 1) * 2.5 * base_interval` no matter how many pollers retry
/// at once. The last error is returned on exhaustion.
pub async fn fetch_with_retry<F, Fut, T, E>(
	height: u64,
	max_attempts: u32,
	base_interval: Duration,
	fetch_fn: F,
) -> Result<T, E>
where
	F: Fn(u64) -> Fut + Send + Sync,
	Fut: Future<Output = Result<T, E>> + Send,
	T: Send,
	E: std::fmt::Display + Send,
{
	WithRetry::new(RetryConfig::new(max_attempts, base_interval))
		.attempt(|| fetch_fn(height))
		.await
}
