//! Shared HTTP client construction.
//!
//! Both the chain gateway bridge and webhook delivery go through a
//! `reqwest-middleware` client that retries transient failures (connection
//! errors, 5xx, 429) with exponential backoff and full jitter.

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, Jitter, RetryTransientMiddleware};
use std::time::Duration;

/// Configuration for HTTP retry policies
#[derive(Debug, Clone)]
pub struct HttpRetryConfig {
	/// Maximum number of retries for transient errors
	pub max_retries: u32,
	/// Base for the exponential backoff
	pub base_for_backoff: u32,
	/// Backoff before the first retry
	pub initial_backoff: Duration,
	/// Maximum backoff between retries
	pub max_backoff: Duration,
	/// Jitter applied to each backoff
	pub jitter: Jitter,
	/// Per-request timeout
	pub request_timeout: Duration,
}

impl Default for HttpRetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_for_backoff: 2,
			initial_backoff: Duration::from_millis(250),
			max_backoff: Duration::from_secs(10),
			jitter: Jitter::Full,
			request_timeout: Duration::from_secs(30),
		}
	}
}

impl HttpRetryConfig {
	/// A config that never retries, used where an outer retry loop already exists
	pub fn without_retries() -> Self {
		Self {
			max_retries: 0,
			..Self::default()
		}
	}
}

/// Creates a retryable HTTP client with middleware
pub fn create_retryable_http_client(
	config: &HttpRetryConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
	let base_client = reqwest::Client::builder()
		.timeout(config.request_timeout)
		.build()?;

	let retry_policy = ExponentialBackoff::builder()
		.base(config.base_for_backoff)
		.retry_bounds(config.initial_backoff, config.max_backoff)
		.jitter(config.jitter)
		.build_with_max_retries(config.max_retries);

	Ok(ClientBuilder::new(base_client)
		.with(RetryTransientMiddleware::new_with_policy(retry_policy))
		.build())
}
