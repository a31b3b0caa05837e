//! Applies subscription events to the subscription index.
//!
//! Subscriptions naming an extended public key on a chain with the `Xpub`
//! capability also get the key's derived addresses recorded, so transactions
//! on any of them reach the subscriber.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

use crate::{
	models::{Subscription, SubscriptionEvent, SubscriptionOperation},
	services::{
		chain::ChainRegistry,
		consumer::{ConsumerError, MessageHandler},
		queue::QueueName,
		subscription::SubscriptionIndex,
	},
};

pub struct Subscriber {
	index: Arc<SubscriptionIndex>,
	registry: Arc<ChainRegistry>,
	batch_limit: usize,
}

impl Subscriber {
	pub fn new(
		index: Arc<SubscriptionIndex>,
		registry: Arc<ChainRegistry>,
		batch_limit: usize,
	) -> Self {
		Self {
			index,
			registry,
			batch_limit: batch_limit.max(1),
		}
	}

	pub async fn apply(&self, event: &SubscriptionEvent) -> Result<(), ConsumerError> {
		match event.operation {
			SubscriptionOperation::AddSubscription => {
				let added = event.new_subscriptions();
				self.write(&added, true, &event.guid).await?;
				self.derive_xpubs(&added).await;
				Ok(())
			}
			SubscriptionOperation::DeleteSubscription => {
				self.write(&event.new_subscriptions(), false, &event.guid).await
			}
			SubscriptionOperation::UpdateSubscription => {
				self.write(&event.old_subscriptions(), false, &event.guid).await?;
				let added = event.new_subscriptions();
				self.write(&added, true, &event.guid).await?;
				self.derive_xpubs(&added).await;
				Ok(())
			}
		}
	}

	async fn write(
		&self,
		subscriptions: &[Subscription],
		add: bool,
		guid: &str,
	) -> Result<(), ConsumerError> {
		let mut changed = 0;
		for chunk in subscriptions.chunks(self.batch_limit) {
			let result = if add {
				self.index.add(chunk).await
			} else {
				self.index.delete(chunk).await
			};
			changed += result.map_err(|e| {
				ConsumerError::processing_error(
					"failed to write subscriptions",
					Some(Box::new(e)),
					Some(HashMap::from([("guid".to_string(), guid.to_string())])),
				)
			})?;
		}

		if !subscriptions.is_empty() {
			tracing::info!(
				guid = %guid,
				requested = subscriptions.len(),
				changed = changed,
				operation = if add { "add" } else { "delete" },
				"Applied subscription changes"
			);
		}
		Ok(())
	}

	/// Records derived addresses for xpub subscriptions.
	///
	/// The subscription itself is already stored, so a failed derivation is
	/// logged rather than failing the event.
	async fn derive_xpubs(&self, subscriptions: &[Subscription]) {
		for subscription in subscriptions.iter().filter(|s| s.is_xpub()) {
			let Some(source) = self.registry.xpub_source(subscription.chain) else {
				tracing::debug!(
					chain = subscription.chain,
					"Chain cannot derive xpub addresses, keeping plain subscription"
				);
				continue;
			};

			let addresses = match source.addresses_from_xpub(&subscription.address).await {
				Ok(addresses) => addresses,
				Err(e) => {
					tracing::error!(
						chain = subscription.chain,
						xpub = %subscription.address,
						error = %e,
						"Failed to derive xpub addresses"
					);
					continue;
				}
			};

			match self
				.index
				.add_xpub(subscription.chain, &subscription.address, &addresses)
				.await
			{
				Ok(added) => tracing::info!(
					chain = subscription.chain,
					derived = addresses.len(),
					added = added,
					"Recorded xpub addresses"
				),
				Err(e) => tracing::error!(
					chain = subscription.chain,
					xpub = %subscription.address,
					error = %e,
					"Failed to record xpub addresses"
				),
			}
		}
	}
}

#[async_trait]
impl MessageHandler for Subscriber {
	fn queue(&self) -> QueueName {
		QueueName::SubscriptionEvents
	}

	async fn handle(&self, payload: &[u8]) -> Result<(), ConsumerError> {
		let event: SubscriptionEvent = serde_json::from_slice(payload).map_err(|e| {
			ConsumerError::invalid_message("undecodable subscription event", Some(Box::new(e)), None)
		})?;
		self.apply(&event).await
	}
}
