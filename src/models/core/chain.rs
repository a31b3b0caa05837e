use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optional capability a chain can provide to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
	/// Current height and block-by-height fetch
	Blocks,
	/// Token holdings lookup by address
	Tokens,
	/// Address derivation from extended public keys
	Xpub,
}

/// Static reference data for one observed chain.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Chain {
	/// SLIP-44 style numeric id
	pub id: u32,
	pub handle: String,
	pub symbol: String,
	pub name: String,
	#[serde(default)]
	pub decimals: u32,
	/// Nominal block time, zero when unknown
	#[serde(default)]
	pub block_time_ms: u64,
	#[serde(default)]
	pub min_confirmations: u64,
	/// Base URL of the adapter gateway serving canonical blocks for this chain
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub capabilities: Vec<Capability>,
}

impl Chain {
	/// Nominal block time, `None` when the chain does not declare one
	pub fn block_time(&self) -> Option<Duration> {
		(self.block_time_ms > 0).then(|| Duration::from_millis(self.block_time_ms))
	}

	pub fn declares(&self, capability: Capability) -> bool {
		self.capabilities.contains(&capability)
	}
}
