use crate::properties::strategies::blocks_strategy;
use chain_observer::services::observer::convert_to_batch;
use proptest::{prelude::*, test_runner::Config};
use std::collections::HashSet;

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_batch_keeps_each_id_once_per_block(blocks in blocks_strategy()) {
		let batch = convert_to_batch(&blocks);

		let expected: usize = blocks
			.iter()
			.map(|block| block.txs.iter().map(|tx| &tx.id).collect::<HashSet<_>>().len())
			.sum();
		prop_assert_eq!(batch.len(), expected);

		for block in &blocks {
			let in_batch: Vec<&str> = batch
				.iter()
				.filter(|tx| tx.block == block.number)
				.map(|tx| tx.id.as_str())
				.collect();
			let unique: HashSet<&str> = in_batch.iter().copied().collect();
			prop_assert_eq!(unique.len(), in_batch.len());
		}
	}

	#[test]
	fn test_batch_preserves_block_order(blocks in blocks_strategy()) {
		let batch = convert_to_batch(&blocks);
		let heights: Vec<u64> = batch.iter().map(|tx| tx.block).collect();
		let mut sorted = heights.clone();
		sorted.sort_unstable();
		prop_assert_eq!(heights, sorted);
	}

	#[test]
	fn test_duplicated_block_contributes_twice(blocks in blocks_strategy()) {
		let single = convert_to_batch(&blocks);
		let doubled: Vec<_> = blocks.iter().chain(blocks.iter()).cloned().collect();
		prop_assert_eq!(convert_to_batch(&doubled).len(), single.len() * 2);
	}
}
