//! Webhook delivery of notification events.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;
use url::Url;

use crate::{
	models::NotificationDelivery,
	services::{
		consumer::{ConsumerError, MessageHandler},
		notification::WebhookSender,
		queue::QueueName,
	},
};

pub const SUBSCRIBER_HEADER: &str = "X-Subscriber-Id";

/// Bounded memory of delivered (subscriber, chain, tx) triples
#[derive(Debug)]
struct DeliveryHistory {
	seen: HashSet<String>,
	order: VecDeque<String>,
	capacity: usize,
}

impl DeliveryHistory {
	fn new(capacity: usize) -> Self {
		Self {
			seen: HashSet::new(),
			order: VecDeque::new(),
			capacity: capacity.max(1),
		}
	}

	fn contains(&self, key: &str) -> bool {
		self.seen.contains(key)
	}

	fn insert(&mut self, key: String) {
		if !self.seen.insert(key.clone()) {
			return;
		}
		self.order.push_back(key);
		while self.order.len() > self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				self.seen.remove(&oldest);
			}
		}
	}
}

/// Posts each notification to its subscriber.
///
/// Subscribers that are http(s) URLs are called directly. Any other identity is
/// delivered to the fallback webhook with the identity in `X-Subscriber-Id`.
pub struct Notifier {
	sender: WebhookSender,
	fallback_url: Option<String>,
	history: Mutex<DeliveryHistory>,
}

impl Notifier {
	pub fn new(sender: WebhookSender, fallback_url: Option<String>, history_size: usize) -> Self {
		Self {
			sender,
			fallback_url,
			history: Mutex::new(DeliveryHistory::new(history_size)),
		}
	}

	fn resolve_target(
		&self,
		subscriber: &str,
	) -> Result<(String, HashMap<String, String>), ConsumerError> {
		if let Ok(url) = Url::parse(subscriber) {
			if matches!(url.scheme(), "http" | "https") {
				return Ok((subscriber.to_string(), HashMap::new()));
			}
		}

		match &self.fallback_url {
			Some(url) => Ok((
				url.clone(),
				HashMap::from([(SUBSCRIBER_HEADER.to_string(), subscriber.to_string())]),
			)),
			None => Err(ConsumerError::invalid_message(
				"subscriber is not a webhook and no fallback webhook is configured",
				None,
				Some(HashMap::from([(
					"subscriber".to_string(),
					subscriber.to_string(),
				)])),
			)),
		}
	}
}

#[async_trait]
impl MessageHandler for Notifier {
	fn queue(&self) -> QueueName {
		QueueName::NotificationEvents
	}

	async fn handle(&self, payload: &[u8]) -> Result<(), ConsumerError> {
		let delivery: NotificationDelivery = serde_json::from_slice(payload).map_err(|e| {
			ConsumerError::invalid_message("undecodable notification", Some(Box::new(e)), None)
		})?;

		let key = delivery.dedupe_key();
		if self.history.lock().await.contains(&key) {
			tracing::debug!(key = %key, "Skipping already delivered notification");
			return Ok(());
		}

		let (url, headers) = self.resolve_target(&delivery.subscriber)?;
		self.sender
			.send(&url, &delivery.event, &headers)
			.await
			.map_err(|e| {
				ConsumerError::processing_error(
					"webhook delivery failed",
					Some(Box::new(e)),
					Some(HashMap::from([("tx".to_string(), delivery.event.result.id.clone())])),
				)
			})?;

		self.history.lock().await.insert(key);
		Ok(())
	}
}
