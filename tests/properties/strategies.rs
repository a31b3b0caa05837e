use chain_observer::models::{
	Block, Chain, Subscription, TokenTransfer, Transfer, Tx, TxPayload, TxStatus,
};
use proptest::prelude::*;

const MAX_TXS_PER_BLOCK: usize = 8;
const MAX_BLOCKS: usize = 10;

pub fn chain_strategy() -> impl Strategy<Value = Chain> {
	(
		0u32..100_000,
		prop_oneof![Just(0u64), 1u64..600_000],
		0u64..12,
	)
		.prop_map(|(id, block_time_ms, min_confirmations)| Chain {
			id,
			handle: format!("chain_{}", id),
			symbol: "SYM".to_string(),
			name: format!("Chain {}", id),
			decimals: 8,
			block_time_ms,
			min_confirmations,
			endpoint: None,
			capabilities: vec![],
		})
}

fn payload_strategy() -> impl Strategy<Value = TxPayload> {
	prop_oneof![
		"[0-9]{1,12}".prop_map(|value| TxPayload::Transfer(Transfer {
			value,
			symbol: "BNB".to_string(),
			decimals: 8,
		})),
		"[A-Z]{3}-[A-Z0-9]{3}".prop_map(|token_id| TxPayload::TokenTransfer(TokenTransfer {
			token_id,
			..Default::default()
		})),
	]
}

pub fn tx_strategy(block: u64) -> impl Strategy<Value = Tx> {
	(
		// Narrow id space so blocks regularly repeat ids
		"tx-[0-9]{1}",
		"[a-z0-9]{4,12}",
		"[a-z0-9]{4,12}",
		payload_strategy(),
	)
		.prop_map(move |(id, from, to, payload)| Tx {
			id,
			chain: 714,
			from,
			to,
			fee: "0".to_string(),
			date: 0,
			block,
			status: TxStatus::Completed,
			sequence: 0,
			memo: String::new(),
			direction: None,
			payload,
		})
}

pub fn block_strategy(number: u64) -> impl Strategy<Value = Block> {
	prop::collection::vec(tx_strategy(number), 0..MAX_TXS_PER_BLOCK)
		.prop_map(move |txs| Block::new(number, txs))
}

pub fn blocks_strategy() -> impl Strategy<Value = Vec<Block>> {
	(1u64..1_000_000, 0..MAX_BLOCKS).prop_flat_map(|(start, count)| {
		(0..count as u64)
			.map(|offset| block_strategy(start + offset))
			.collect::<Vec<_>>()
	})
}

pub fn subscriptions_strategy() -> impl Strategy<Value = Vec<Subscription>> {
	prop::collection::vec(
		(
			prop::sample::select(vec![0u32, 60, 714]),
			"[a-z0-9]{1,6}",
			prop::sample::select(vec!["hook-1", "hook-2", "hook-3"]),
		)
			.prop_map(|(chain, address, subscriber)| Subscription::new(chain, address, subscriber)),
		0..20,
	)
}
