//! Observer tuning configuration.
//!
//! Every field has a default, so a missing `config/observer.json` is not an error.
//! Secrets and deployment paths may also come from the environment:
//! - STORAGE_PATH: directory of the file-backed stores
//! - REDIS_URL: broker holding the queue streams
//! - NOTIFIER_WEBHOOK_URL: fallback webhook for subscribers that are not URLs
//! - NOTIFIER_WEBHOOK_SECRET: HMAC secret used to sign webhook payloads

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

use crate::models::config::error::ConfigError;

const DEFAULT_OBSERVER_CONFIG: &str = "config/observer.json";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObserverConfig {
	/// Floor of the per-chain poll interval
	pub min_poll_interval_ms: u64,
	/// How far back a chain without a tracker record starts
	pub backlog_window_ms: u64,
	/// Maximum number of blocks fetched in one cycle
	pub max_backlog_blocks: u64,
	/// Concurrent block fetches within one cycle
	pub fetch_workers: usize,
	pub retry_max_attempts: u32,
	pub retry_base_interval_ms: u64,
	/// Concurrent subscription reads during lookup
	pub lookup_workers: usize,
	/// Concurrent queue publishes during dispatch
	pub publish_workers: usize,
	pub storage_path: String,
	pub consumer_prefetch: usize,
	pub max_redeliveries: u32,
	pub subscriber_batch_limit: usize,
	pub delivery_history_size: usize,
	pub broker_check_interval_ms: u64,
	pub broker_max_reconnects: usize,
	pub redis_url: String,
	/// Consumer group every queue stream is read through
	pub queue_group: String,
	/// Name of this process within the group. Keep it stable across restarts so
	/// messages left unacknowledged are picked up again.
	pub queue_consumer: String,
	/// How long one stream read waits for new entries
	pub queue_block_ms: u64,
	pub notifier_webhook_url: Option<String>,
	pub notifier_secret: Option<String>,
}

impl Default for ObserverConfig {
	fn default() -> Self {
		Self {
			min_poll_interval_ms: 250,
			backlog_window_ms: 3 * 60 * 60 * 1000,
			max_backlog_blocks: 1000,
			fetch_workers: 8,
			retry_max_attempts: 3,
			retry_base_interval_ms: 250,
			lookup_workers: 16,
			publish_workers: 16,
			storage_path: "data".to_string(),
			consumer_prefetch: 10,
			max_redeliveries: 5,
			subscriber_batch_limit: 3000,
			delivery_history_size: 10_000,
			broker_check_interval_ms: 5000,
			broker_max_reconnects: 10,
			redis_url: "redis://127.0.0.1:6379/".to_string(),
			queue_group: "chain-observer".to_string(),
			queue_consumer: "observer-0".to_string(),
			queue_block_ms: 2000,
			notifier_webhook_url: None,
			notifier_secret: None,
		}
	}
}

impl ObserverConfig {
	/// Loads the observer config, falling back to defaults when the file is absent
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let path = path.unwrap_or(Path::new(DEFAULT_OBSERVER_CONFIG));

		let mut config = if path.exists() {
			let file = std::fs::File::open(path)?;
			serde_json::from_reader(file)?
		} else {
			tracing::info!(
				"No observer config at {}, using defaults",
				path.display()
			);
			Self::default()
		};

		config.apply_env_overrides();
		config.validate()?;
		Ok(config)
	}

	fn apply_env_overrides(&mut self) {
		if let Ok(path) = std::env::var("STORAGE_PATH") {
			self.storage_path = path;
		}
		if let Ok(url) = std::env::var("REDIS_URL") {
			self.redis_url = url;
		}
		if let Ok(url) = std::env::var("NOTIFIER_WEBHOOK_URL") {
			self.notifier_webhook_url = Some(url);
		}
		if let Ok(secret) = std::env::var("NOTIFIER_WEBHOOK_SECRET") {
			self.notifier_secret = Some(secret);
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let positive = [
			("min_poll_interval_ms", self.min_poll_interval_ms as u128),
			("max_backlog_blocks", self.max_backlog_blocks as u128),
			("fetch_workers", self.fetch_workers as u128),
			("retry_max_attempts", self.retry_max_attempts as u128),
			("lookup_workers", self.lookup_workers as u128),
			("publish_workers", self.publish_workers as u128),
			("consumer_prefetch", self.consumer_prefetch as u128),
			("subscriber_batch_limit", self.subscriber_batch_limit as u128),
			("broker_check_interval_ms", self.broker_check_interval_ms as u128),
			("queue_block_ms", self.queue_block_ms as u128),
		];
		for (field, value) in positive {
			if value == 0 {
				return Err(ConfigError::validation_error(
					format!("{} must be greater than 0", field),
					None,
					None,
				));
			}
		}

		let broker = url::Url::parse(&self.redis_url).map_err(|e| {
			ConfigError::validation_error(
				"redis_url is not a valid URL",
				Some(Box::new(e)),
				Some(HashMap::from([("url".to_string(), self.redis_url.clone())])),
			)
		})?;
		if !matches!(broker.scheme(), "redis" | "rediss" | "redis+unix" | "unix") {
			return Err(ConfigError::validation_error(
				"redis_url must use the redis or rediss scheme",
				None,
				Some(HashMap::from([("url".to_string(), self.redis_url.clone())])),
			));
		}
		if self.queue_group.is_empty() || self.queue_consumer.is_empty() {
			return Err(ConfigError::validation_error(
				"queue_group and queue_consumer must not be empty",
				None,
				None,
			));
		}

		if let Some(webhook) = &self.notifier_webhook_url {
			let parsed = url::Url::parse(webhook).map_err(|e| {
				ConfigError::validation_error(
					"notifier_webhook_url is not a valid URL",
					Some(Box::new(e)),
					Some(HashMap::from([("url".to_string(), webhook.clone())])),
				)
			})?;
			if !matches!(parsed.scheme(), "http" | "https") {
				return Err(ConfigError::validation_error(
					"notifier_webhook_url must use http or https",
					None,
					Some(HashMap::from([("url".to_string(), webhook.clone())])),
				));
			}
		}

		Ok(())
	}

	pub fn min_poll_interval(&self) -> Duration {
		Duration::from_millis(self.min_poll_interval_ms)
	}

	pub fn backlog_window(&self) -> Duration {
		Duration::from_millis(self.backlog_window_ms)
	}

	pub fn retry_base_interval(&self) -> Duration {
		Duration::from_millis(self.retry_base_interval_ms)
	}

	pub fn broker_check_interval(&self) -> Duration {
		Duration::from_millis(self.broker_check_interval_ms)
	}
}
