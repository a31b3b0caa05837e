use serde::{Deserialize, Serialize};

use crate::models::Tx;

/// A fetched block in canonical form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Block {
	/// Block height
	pub number: u64,
	/// Block hash when the chain exposes one
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default)]
	pub txs: Vec<Tx>,
}

impl Block {
	pub fn new(number: u64, txs: Vec<Tx>) -> Self {
		Self {
			number,
			id: None,
			txs,
		}
	}
}
