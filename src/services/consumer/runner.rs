//! Queue draining loop shared by every consumer.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::{
	sync::{watch, Semaphore},
	task::JoinSet,
};

use crate::{
	services::{
		consumer::ConsumerError,
		queue::{Delivery, DurableQueue, QueueName},
	},
	utils::metrics::record_consumer_outcome,
};

/// Pause after a failed receive before trying again
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Applies the side effect of one message.
///
/// Implementations must be idempotent: a message can arrive more than once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
	fn queue(&self) -> QueueName;

	async fn handle(&self, payload: &[u8]) -> Result<(), ConsumerError>;
}

/// What became of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
	Acked,
	/// Invalid payload, acknowledged without effect
	Rejected,
	/// Failed and handed back to the queue
	Requeued,
	/// Failed too many times and discarded
	Dropped,
}

impl ConsumeOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConsumeOutcome::Acked => "ack",
			ConsumeOutcome::Rejected => "rejected",
			ConsumeOutcome::Requeued => "requeued",
			ConsumeOutcome::Dropped => "dropped",
		}
	}
}

pub struct ConsumerRunner {
	queue: Arc<dyn DurableQueue>,
	handler: Arc<dyn MessageHandler>,
	prefetch: usize,
	max_redeliveries: u32,
}

impl ConsumerRunner {
	pub fn new(
		queue: Arc<dyn DurableQueue>,
		handler: Arc<dyn MessageHandler>,
		prefetch: usize,
		max_redeliveries: u32,
	) -> Self {
		Self {
			queue,
			handler,
			prefetch: prefetch.max(1),
			max_redeliveries,
		}
	}

	/// Drains the queue until shutdown, keeping at most `prefetch` messages in
	/// flight. Messages already being handled are finished before returning.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		let name = self.handler.queue();
		let permits = Arc::new(Semaphore::new(self.prefetch));
		let mut in_flight = JoinSet::new();
		tracing::info!(queue = %name, prefetch = self.prefetch, "Starting consumer");

		loop {
			let permit = tokio::select! {
				permit = permits.clone().acquire_owned() => match permit {
					Ok(permit) => permit,
					Err(_) => break,
				},
				_ = wait_for_shutdown(&mut shutdown) => break,
			};

			let delivery = tokio::select! {
				delivery = self.queue.receive(name) => delivery,
				_ = wait_for_shutdown(&mut shutdown) => break,
			};

			let delivery = match delivery {
				Ok(delivery) => delivery,
				Err(e) => {
					tracing::warn!(queue = %name, error = %e, "Receive failed");
					drop(permit);
					tokio::select! {
						_ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => continue,
						_ = wait_for_shutdown(&mut shutdown) => break,
					}
				}
			};

			let queue = self.queue.clone();
			let handler = self.handler.clone();
			let max_redeliveries = self.max_redeliveries;
			in_flight.spawn(async move {
				let outcome =
					process_delivery(queue.as_ref(), handler.as_ref(), delivery, max_redeliveries)
						.await;
				drop(permit);
				outcome
			});

			while in_flight.try_join_next().is_some() {}
		}

		while in_flight.join_next().await.is_some() {}
		tracing::info!(queue = %name, "Consumer stopped");
	}
}

/// Runs the handler and settles the delivery with the broker
pub async fn process_delivery(
	queue: &dyn DurableQueue,
	handler: &dyn MessageHandler,
	delivery: Delivery,
	max_redeliveries: u32,
) -> ConsumeOutcome {
	let name = delivery.queue;
	let outcome = match handler.handle(&delivery.payload).await {
		Ok(()) => ConsumeOutcome::Acked,
		Err(e) if !e.is_retryable() => ConsumeOutcome::Rejected,
		Err(_) if delivery.redeliveries >= max_redeliveries => {
			tracing::error!(
				queue = %name,
				redeliveries = delivery.redeliveries,
				"Giving up on message after repeated failures"
			);
			ConsumeOutcome::Dropped
		}
		Err(_) => ConsumeOutcome::Requeued,
	};

	let settled = match outcome {
		ConsumeOutcome::Acked | ConsumeOutcome::Rejected => queue.ack(name, delivery.tag).await,
		ConsumeOutcome::Dropped => queue.nack(name, delivery.tag, false).await,
		ConsumeOutcome::Requeued => queue.nack(name, delivery.tag, true).await,
	};
	if let Err(e) = settled {
		// The broker redelivers unsettled messages once the connection is back
		tracing::warn!(queue = %name, tag = delivery.tag, error = %e, "Failed to settle delivery");
	}

	record_consumer_outcome(name.as_str(), outcome.as_str());
	outcome
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
	while !*shutdown.borrow() {
		if shutdown.changed().await.is_err() {
			return;
		}
	}
}
