use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Asset ids keyed by chain-prefixed address (`{chain}_{address}`)
pub type AssetsByAddress = BTreeMap<String, Vec<String>>;

pub fn build_asset_id(chain: u32, token_id: &str) -> String {
	format!("c{}_t{}", chain, token_id)
}

pub fn prefixed_address(chain: u32, address: &str) -> String {
	format!("{}_{}", chain, address)
}

/// Splits `{chain}_{address}` back into its parts
pub fn split_prefixed_address(prefixed: &str) -> Option<(u32, &str)> {
	let (chain, address) = prefixed.split_once('_')?;
	let chain = chain.parse().ok()?;
	(!address.is_empty()).then_some((chain, address))
}

/// A token held by an address, as reported by a chain's token capability
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenAsset {
	pub chain: u32,
	pub token_id: String,
	#[serde(default)]
	pub symbol: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub decimals: u32,
}

impl TokenAsset {
	pub fn asset_id(&self) -> String {
		build_asset_id(self.chain, &self.token_id)
	}
}

/// Request for the tokens held by a set of addresses
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TokensRequest {
	/// Addresses keyed by chain id in string form
	pub addresses: BTreeMap<String, Vec<String>>,
	/// Only associations first seen at or after this unix time are returned
	#[serde(default)]
	pub from: i64,
}

impl TokensRequest {
	/// Prefixed addresses of the request; non-numeric chain keys are skipped
	pub fn prefixed_addresses(&self) -> Vec<String> {
		let mut addresses: Vec<String> = self
			.addresses
			.iter()
			.filter_map(|(chain, addresses)| chain.parse::<u32>().ok().map(|c| (c, addresses)))
			.flat_map(|(chain, addresses)| {
				addresses
					.iter()
					.filter(|a| !a.is_empty())
					.map(move |a| prefixed_address(chain, a))
			})
			.collect();
		addresses.sort();
		addresses.dedup();
		addresses
	}
}
