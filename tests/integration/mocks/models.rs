use chain_observer::models::{
	Block, Capability, Chain, TokenTransfer, Transfer, Tx, TxPayload, TxStatus,
};

pub const BNB_SENDER: &str = "tbnb1ttyn4csghfgyxreu7lmdu3lcplhqhxtzced45a";
pub const BNB_RECEIVER: &str = "tbnb12hlquylu78cjylk5zshxpdj6hf3t0tahwjt3ex";

pub fn create_test_chain(id: u32, block_time_ms: u64) -> Chain {
	Chain {
		id,
		handle: format!("chain_{}", id),
		symbol: "TST".to_string(),
		name: format!("Test chain {}", id),
		decimals: 8,
		block_time_ms,
		min_confirmations: 0,
		endpoint: None,
		capabilities: vec![Capability::Blocks, Capability::Tokens],
	}
}

pub fn create_test_tx(chain: u32, id: &str, block: u64, from: &str, to: &str) -> Tx {
	Tx {
		id: id.to_string(),
		chain,
		from: from.to_string(),
		to: to.to_string(),
		fee: "125000".to_string(),
		date: 1_555_117_625,
		block,
		status: TxStatus::Completed,
		sequence: 0,
		memo: String::new(),
		direction: None,
		payload: TxPayload::Transfer(Transfer {
			value: "100000".to_string(),
			symbol: "BNB".to_string(),
			decimals: 8,
		}),
	}
}

pub fn create_token_transfer(chain: u32, id: &str, block: u64, token_id: &str) -> Tx {
	Tx {
		payload: TxPayload::TokenTransfer(TokenTransfer {
			name: "YLC".to_string(),
			symbol: "YLC".to_string(),
			token_id: token_id.to_string(),
			decimals: 8,
			value: "210572645".to_string(),
			from: BNB_SENDER.to_string(),
			to: BNB_RECEIVER.to_string(),
		}),
		..create_test_tx(chain, id, block, BNB_SENDER, BNB_RECEIVER)
	}
}

pub fn create_test_block(number: u64, txs: Vec<Tx>) -> Block {
	Block::new(number, txs)
}
