//! Answers token holdings requests and records what chains report.

use async_trait::async_trait;
use chrono::Utc;
use futures::{stream, StreamExt};
use std::sync::Arc;

use crate::{
	models::{split_prefixed_address, AssetsByAddress, TokensRequest},
	services::{
		assets::{assets_since, AssetStore},
		chain::ChainRegistry,
		consumer::{ConsumerError, MessageHandler},
		queue::{publish_json, DurableQueue, QueueName},
	},
};

/// Resolves the assets of a set of addresses.
///
/// Known addresses are answered from the asset store. Unknown ones are asked
/// of their chain's token capability, and the answers are queued so the
/// searcher consumer can make those addresses known.
pub struct TokenSearcher {
	registry: Arc<ChainRegistry>,
	assets: Arc<AssetStore>,
	queue: Arc<dyn DurableQueue>,
	lookup_workers: usize,
}

impl TokenSearcher {
	pub fn new(
		registry: Arc<ChainRegistry>,
		assets: Arc<AssetStore>,
		queue: Arc<dyn DurableQueue>,
		lookup_workers: usize,
	) -> Self {
		Self {
			registry,
			assets,
			queue,
			lookup_workers: lookup_workers.max(1),
		}
	}

	pub async fn handle_tokens_request(
		&self,
		request: &TokensRequest,
	) -> anyhow::Result<AssetsByAddress> {
		let addresses = request.prefixed_addresses();
		let (known, unknown) = self.assets.partition_known(&addresses).await?;

		let from_store = assets_since(&known, request.from);
		let from_chains = self.fetch_from_chains(&unknown).await;

		if !from_chains.is_empty() {
			if let Err(e) =
				publish_json(self.queue.as_ref(), QueueName::TokenSearcherEvents, &from_chains).await
			{
				tracing::error!(error = %e, "Failed to publish fetched assets");
			}
		}

		Ok(addresses
			.into_iter()
			.filter_map(|address| {
				let assets = from_store
					.get(&address)
					.or_else(|| from_chains.get(&address))?
					.clone();
				Some((address, assets))
			})
			.collect())
	}

	/// Fetches unknown addresses; failures and chains without tokens are skipped
	async fn fetch_from_chains(&self, unknown: &[String]) -> AssetsByAddress {
		stream::iter(unknown.iter().filter_map(|prefixed| {
			let (chain, address) = split_prefixed_address(prefixed)?;
			let source = self.registry.token_source(chain)?;
			Some(async move {
				match source.tokens_by_address(address).await {
					Ok(tokens) => {
						let assets = tokens.iter().map(|t| t.asset_id()).collect::<Vec<_>>();
						Some((prefixed.clone(), assets))
					}
					Err(e) => {
						tracing::warn!(address = %prefixed, error = %e, "Token lookup failed");
						None
					}
				}
			})
		}))
		.buffer_unordered(self.lookup_workers)
		.filter_map(|entry| async move { entry })
		.collect()
		.await
	}
}

/// Records chain-reported assets, making their addresses known
pub struct TokenSearcherConsumer {
	assets: Arc<AssetStore>,
}

impl TokenSearcherConsumer {
	pub fn new(assets: Arc<AssetStore>) -> Self {
		Self { assets }
	}
}

#[async_trait]
impl MessageHandler for TokenSearcherConsumer {
	fn queue(&self) -> QueueName {
		QueueName::TokenSearcherEvents
	}

	async fn handle(&self, payload: &[u8]) -> Result<(), ConsumerError> {
		let associations: AssetsByAddress = serde_json::from_slice(payload).map_err(|e| {
			ConsumerError::invalid_message("undecodable asset associations", Some(Box::new(e)), None)
		})?;

		self.assets
			.add_associations(&associations, Utc::now().timestamp())
			.await
			.map_err(|e| {
				ConsumerError::processing_error("failed to store associations", Some(e.into()), None)
			})?;
		Ok(())
	}
}
