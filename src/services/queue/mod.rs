//! At-least-once message queue seam.
//!
//! Producers publish JSON payloads to named queues. Consumers receive one
//! delivery at a time and must ack it once its side effect is applied; a nack
//! with requeue, or a lost connection, hands the message out again.
//!
//! `RedisQueue` is the production broker; `InMemoryQueue` keeps the same
//! semantics inside the process for tests.

mod error;
mod memory;
mod streams;
mod supervisor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

pub use error::QueueError;
pub use memory::InMemoryQueue;
pub use streams::{dead_letter_stream, RedisQueue};
pub use supervisor::ConnectionSupervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
	SubscriptionEvents,
	NotificationEvents,
	TokenIndexerEvents,
	TokenSearcherEvents,
}

impl QueueName {
	pub const ALL: [QueueName; 4] = [
		QueueName::SubscriptionEvents,
		QueueName::NotificationEvents,
		QueueName::TokenIndexerEvents,
		QueueName::TokenSearcherEvents,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			QueueName::SubscriptionEvents => "subscription-events",
			QueueName::NotificationEvents => "notification-events",
			QueueName::TokenIndexerEvents => "token-indexer-events",
			QueueName::TokenSearcherEvents => "token-searcher-events",
		}
	}
}

impl fmt::Display for QueueName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A message handed to a consumer and awaiting ack or nack
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
	pub queue: QueueName,
	pub tag: u64,
	pub payload: Vec<u8>,
	/// How many times this message was handed out before
	pub redeliveries: u32,
}

#[async_trait]
pub trait DurableQueue: Send + Sync {
	async fn declare(&self, queue: QueueName) -> Result<(), QueueError>;

	/// Returns once the broker has accepted the message
	async fn publish(&self, queue: QueueName, payload: Vec<u8>) -> Result<(), QueueError>;

	/// Waits for the next delivery
	async fn receive(&self, queue: QueueName) -> Result<Delivery, QueueError>;

	async fn ack(&self, queue: QueueName, tag: u64) -> Result<(), QueueError>;

	async fn nack(&self, queue: QueueName, tag: u64, requeue: bool) -> Result<(), QueueError>;

	async fn health_check(&self) -> Result<(), QueueError>;

	async fn reconnect(&self) -> Result<(), QueueError>;
}

/// Serializes `value` as JSON and publishes it
pub async fn publish_json<T: Serialize + ?Sized + Sync>(
	queue: &dyn DurableQueue,
	name: QueueName,
	value: &T,
) -> Result<(), QueueError> {
	let payload = serde_json::to_vec(value).map_err(|e| {
		QueueError::serialization_error(
			"failed to encode message",
			Some(Box::new(e)),
			Some(HashMap::from([("queue".to_string(), name.to_string())])),
		)
	})?;
	queue.publish(name, payload).await
}

/// Declares every queue the pipeline uses
pub async fn declare_all(queue: &dyn DurableQueue) -> Result<(), QueueError> {
	for name in QueueName::ALL {
		queue.declare(name).await?;
	}
	Ok(())
}

pub(crate) fn queue_metadata(queue: QueueName) -> HashMap<String, String> {
	HashMap::from([("queue".to_string(), queue.to_string())])
}

pub(crate) fn unknown_tag(queue: QueueName, tag: u64) -> QueueError {
	QueueError::consume_error(
		"unknown delivery tag",
		None,
		Some(HashMap::from([
			("queue".to_string(), queue.to_string()),
			("tag".to_string(), tag.to_string()),
		])),
	)
}
