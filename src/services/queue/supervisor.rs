//! Broker connection watchdog.
//!
//! Checks the connection every `check_interval` and reconnects with jittered
//! exponential backoff. Running without a broker is not an option: once
//! `max_reconnects` attempts fail in a row the supervisor returns an error and
//! the process is expected to exit.

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::watch;

use crate::services::queue::{DurableQueue, QueueError};

pub struct ConnectionSupervisor {
	queue: Arc<dyn DurableQueue>,
	check_interval: Duration,
	max_reconnects: usize,
}

impl ConnectionSupervisor {
	pub fn new(queue: Arc<dyn DurableQueue>, check_interval: Duration, max_reconnects: usize) -> Self {
		Self {
			queue,
			check_interval,
			max_reconnects,
		}
	}

	/// Runs until shutdown; an `Err` means the broker is gone for good
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
		loop {
			tokio::select! {
				_ = tokio::time::sleep(self.check_interval) => {}
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						return Ok(());
					}
					continue;
				}
			}

			if let Err(e) = self.queue.health_check().await {
				tracing::warn!(error = %e, "Broker health check failed, reconnecting");
				self.reconnect().await?;
				tracing::info!("Broker connection re-established");
			}
		}
	}

	/// Reconnects with backoff, giving up after `max_reconnects` attempts
	pub async fn reconnect(&self) -> Result<(), QueueError> {
		let backoff = ExponentialBuilder::default()
			.with_min_delay(self.check_interval / 10)
			.with_max_delay(self.check_interval)
			.with_jitter();

		let max_reconnects = self.max_reconnects;
		(|| async { self.queue.reconnect().await })
			.retry(backoff.build().take(max_reconnects.saturating_sub(1)))
			.notify(|e: &QueueError, delay: Duration| {
				tracing::warn!(
					error = %e,
					retry_in_ms = delay.as_millis() as u64,
					"Broker reconnect failed"
				);
			})
			.await
			.map_err(|e| {
				QueueError::connection_error(
					"broker unreachable, giving up",
					Some(Box::new(e)),
					Some(HashMap::from([(
						"attempts".to_string(),
						max_reconnects.to_string(),
					)])),
				)
			})
	}
}
