//! Flattening of fetched blocks into one transaction batch.

use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use crate::models::{Block, Tx};

/// Flattens blocks in order.
///
/// A transaction id repeated inside one block is kept once. Blocks are not
/// compared with each other, so the same block fetched twice contributes its
/// transactions twice; cross-block duplicates collapse downstream per
/// (subscriber, tx id). Transactions whose adapter left `block` unset inherit
/// the containing block's number.
pub fn convert_to_batch(blocks: &[Block]) -> Vec<Tx> {
	let mut txs = Vec::with_capacity(blocks.iter().map(|b| b.txs.len()).sum());
	for block in blocks {
		let mut seen = HashSet::with_capacity(block.txs.len());
		txs.extend(
			block
				.txs
				.iter()
				.filter(|tx| seen.insert(tx.id.as_str()))
				.map(|tx| {
					let mut tx = tx.clone();
					if tx.block == 0 {
						tx.block = block.number;
					}
					tx
				}),
		);
	}
	txs
}

/// Accumulator shared by the fetch workers of one cycle.
///
/// Transactions are keyed by the height they were fetched at, so the batch
/// comes out in block order whatever order the workers finish in.
#[derive(Debug, Default)]
pub struct TransactionsBatch {
	blocks: Mutex<BTreeMap<u64, Vec<Tx>>>,
}

impl TransactionsBatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `txs` under `height`; an empty slice changes nothing
	pub async fn add(&self, height: u64, txs: Vec<Tx>) {
		if txs.is_empty() {
			return;
		}
		self.blocks.lock().await.entry(height).or_default().extend(txs);
	}

	pub async fn len(&self) -> usize {
		self.blocks.lock().await.values().map(Vec::len).sum()
	}

	pub async fn is_empty(&self) -> bool {
		self.blocks.lock().await.is_empty()
	}

	/// Transactions in ascending height order
	pub fn into_txs(self) -> Vec<Tx> {
		self.blocks.into_inner().into_values().flatten().collect()
	}
}
