//! Matching of transaction batches against subscriptions and publication of
//! the resulting events.

mod error;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::{
	collections::{BTreeMap, BTreeSet, HashMap, HashSet},
	sync::Arc,
};

use crate::{
	models::{NotificationDelivery, NotificationEvent, Tx},
	services::{
		queue::{publish_json, DurableQueue, QueueError, QueueName},
		subscription::SubscriptionIndex,
	},
	utils::metrics::NOTIFICATIONS_PUBLISHED,
};

pub use error::DispatchError;

/// Hand-off point between a poller and the queue.
///
/// `Ok` means every event derived from the batch was accepted by the queue.
#[async_trait]
pub trait TxDispatcher: Send + Sync {
	async fn dispatch(&self, txs: &[Tx]) -> Result<(), DispatchError>;
}

pub struct EventDispatcher {
	index: Arc<SubscriptionIndex>,
	queue: Arc<dyn DurableQueue>,
	publish_workers: usize,
}

impl EventDispatcher {
	pub fn new(
		index: Arc<SubscriptionIndex>,
		queue: Arc<dyn DurableQueue>,
		publish_workers: usize,
	) -> Self {
		Self {
			index,
			queue,
			publish_workers: publish_workers.max(1),
		}
	}

	/// Resolves the notifications a batch produces.
	///
	/// Addresses are looked up once per chain. A subscriber gets one event per
	/// transaction even when it watches both ends or the transaction appears
	/// twice in the batch. Each event carries the direction of the transaction as
	/// seen from the addresses that subscriber watches.
	pub async fn match_batch(&self, txs: &[Tx]) -> Vec<NotificationDelivery> {
		let mut addresses_by_chain: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
		for tx in txs {
			addresses_by_chain
				.entry(tx.chain)
				.or_default()
				.extend(tx.addresses().into_iter().map(str::to_string));
		}

		// (chain, address) -> subscribers watching it
		let mut watchers: HashMap<(u32, String), BTreeSet<String>> = HashMap::new();
		for (chain, addresses) in addresses_by_chain {
			let addresses: Vec<String> = addresses.into_iter().collect();
			for subscription in self.index.lookup(chain, &addresses).await {
				watchers
					.entry((chain, subscription.address))
					.or_default()
					.insert(subscription.subscriber);
			}
		}

		let watches = |subscriber: &str, chain: u32, address: &str| {
			watchers
				.get(&(chain, address.to_string()))
				.is_some_and(|subscribers| subscribers.contains(subscriber))
		};

		let mut seen = HashSet::new();
		let mut deliveries = Vec::new();
		for tx in txs {
			for address in tx.addresses() {
				let Some(subscribers) = watchers.get(&(tx.chain, address.to_string())) else {
					continue;
				};
				for subscriber in subscribers {
					if !seen.insert((subscriber.clone(), tx.chain, tx.id.clone())) {
						continue;
					}
					let direction = tx.direction_for(|a| watches(subscriber, tx.chain, a));
					deliveries.push(NotificationDelivery {
						subscriber: subscriber.clone(),
						event: NotificationEvent::for_subscriber(tx, direction),
					});
				}
			}
		}
		deliveries
	}
}

#[async_trait]
impl TxDispatcher for EventDispatcher {
	async fn dispatch(&self, txs: &[Tx]) -> Result<(), DispatchError> {
		if txs.is_empty() {
			return Ok(());
		}

		let deliveries = self.match_batch(txs).await;
		let total = deliveries.len() + 1;

		let mut failed: Vec<(String, QueueError)> = Vec::new();
		if let Err(e) = publish_json(self.queue.as_ref(), QueueName::TokenIndexerEvents, txs).await {
			failed.push(("token-index-batch".to_string(), e));
		}

		let results: Vec<(String, Result<(), QueueError>)> = stream::iter(deliveries)
			.map(|delivery| async move {
				let result =
					publish_json(self.queue.as_ref(), QueueName::NotificationEvents, &delivery).await;
				(delivery.event.result.id, result)
			})
			.buffer_unordered(self.publish_workers)
			.collect()
			.await;

		let mut published = 0;
		for (tx_id, result) in results {
			match result {
				Ok(()) => published += 1,
				Err(e) => failed.push((tx_id, e)),
			}
		}
		NOTIFICATIONS_PUBLISHED.inc_by(published);

		if failed.is_empty() {
			tracing::debug!(
				transactions = txs.len(),
				notifications = published,
				"Dispatched batch"
			);
			return Ok(());
		}

		let failed_count = failed.len();
		let failed_ids: BTreeSet<String> = failed.iter().map(|(id, _)| id.clone()).collect();
		let (_, first) = failed.remove(0);
		Err(DispatchError::publish_error(
			format!("{} of {} events failed to publish", failed_count, total),
			Some(Box::new(first)),
			Some(HashMap::from([
				("failed".to_string(), failed_count.to_string()),
				("total".to_string(), total.to_string()),
				(
					"tx_ids".to_string(),
					failed_ids.into_iter().collect::<Vec<_>>().join(","),
				),
			])),
		))
	}
}
