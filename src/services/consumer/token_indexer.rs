//! Keeps asset associations of known addresses current.

use async_trait::async_trait;
use chrono::Utc;
use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use crate::{
	models::{build_asset_id, prefixed_address, AssetsByAddress, Tx, TxPayload},
	services::{
		assets::AssetStore,
		consumer::{ConsumerError, MessageHandler},
		queue::QueueName,
	},
};

/// Asset ids touched by each participant of the batch.
///
/// Only token transfers and actions naming a token carry an asset. Every
/// participant of such a transaction is associated with that asset.
pub fn associations_from_txs(txs: &[Tx]) -> AssetsByAddress {
	let mut associations: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

	for tx in txs {
		let token_id = match &tx.payload {
			TxPayload::TokenTransfer(transfer) => transfer.token_id.as_str(),
			TxPayload::AnyAction(action) => action.token_id.as_str(),
			_ => continue,
		};
		if token_id.is_empty() {
			continue;
		}

		let asset_id = build_asset_id(tx.chain, token_id);
		for address in tx.addresses() {
			associations
				.entry(prefixed_address(tx.chain, address))
				.or_default()
				.insert(asset_id.clone());
		}
	}

	associations
		.into_iter()
		.map(|(address, assets)| (address, assets.into_iter().collect()))
		.collect()
}

/// Consumes raw transaction batches and extends the assets of addresses
/// that are already known. Unknown addresses are left for the searcher.
pub struct TokenIndexer {
	assets: Arc<AssetStore>,
}

impl TokenIndexer {
	pub fn new(assets: Arc<AssetStore>) -> Self {
		Self { assets }
	}

	pub async fn index(&self, txs: &[Tx], now: i64) -> Result<usize, ConsumerError> {
		let associations = associations_from_txs(txs);
		if associations.is_empty() {
			return Ok(0);
		}

		let addresses: Vec<String> = associations.keys().cloned().collect();
		let (known, _) = self.assets.partition_known(&addresses).await.map_err(|e| {
			ConsumerError::processing_error("failed to read known addresses", Some(e.into()), None)
		})?;

		let known_associations: AssetsByAddress = associations
			.into_iter()
			.filter(|(address, _)| known.contains_key(address))
			.collect();
		if known_associations.is_empty() {
			return Ok(0);
		}

		let added = self
			.assets
			.add_associations(&known_associations, now)
			.await
			.map_err(|e| {
				ConsumerError::processing_error("failed to store associations", Some(e.into()), None)
			})?;

		tracing::debug!(
			addresses = known_associations.len(),
			added = added,
			"Updated asset associations"
		);
		Ok(added)
	}
}

#[async_trait]
impl MessageHandler for TokenIndexer {
	fn queue(&self) -> QueueName {
		QueueName::TokenIndexerEvents
	}

	async fn handle(&self, payload: &[u8]) -> Result<(), ConsumerError> {
		let txs: Vec<Tx> = serde_json::from_slice(payload).map_err(|e| {
			ConsumerError::invalid_message("undecodable transaction batch", Some(Box::new(e)), None)
		})?;
		self.index(&txs, Utc::now().timestamp()).await.map(|_| ())
	}
}
