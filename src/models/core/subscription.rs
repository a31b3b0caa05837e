use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage key of the subscriber set for one address on one chain
pub fn subscription_key(chain: u32, address: &str) -> String {
	format!("{}-{}", chain, address)
}

/// A standing registration of interest in an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Subscription {
	pub chain: u32,
	pub address: String,
	/// Webhook URL or opaque subscriber id
	pub subscriber: String,
}

impl Subscription {
	pub fn new(chain: u32, address: impl Into<String>, subscriber: impl Into<String>) -> Self {
		Self {
			chain,
			address: address.into(),
			subscriber: subscriber.into(),
		}
	}

	pub fn key(&self) -> String {
		subscription_key(self.chain, &self.address)
	}

	/// Whether the address is a BIP-32 extended public key rather than a
	/// plain address
	pub fn is_xpub(&self) -> bool {
		const PREFIXES: [&str; 6] = ["xpub", "ypub", "zpub", "tpub", "upub", "vpub"];
		self.address.len() > 100
			&& PREFIXES.iter().any(|prefix| self.address.starts_with(prefix))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SubscriptionOperation {
	AddSubscription,
	UpdateSubscription,
	DeleteSubscription,
}

/// Inbound subscription diff, keyed by chain id in string form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionEvent {
	#[serde(default)]
	pub new_subscriptions: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub old_subscriptions: BTreeMap<String, Vec<String>>,
	pub guid: String,
	pub operation: SubscriptionOperation,
}

impl SubscriptionEvent {
	pub fn new_subscriptions(&self) -> Vec<Subscription> {
		Self::parse(&self.new_subscriptions, &self.guid)
	}

	pub fn old_subscriptions(&self) -> Vec<Subscription> {
		Self::parse(&self.old_subscriptions, &self.guid)
	}

	/// Chain keys that are not numeric and blank addresses are skipped.
	fn parse(map: &BTreeMap<String, Vec<String>>, guid: &str) -> Vec<Subscription> {
		let mut subscriptions: Vec<Subscription> = map
			.iter()
			.filter_map(|(chain, addresses)| chain.parse::<u32>().ok().map(|c| (c, addresses)))
			.flat_map(|(chain, addresses)| {
				addresses
					.iter()
					.filter(|address| !address.trim().is_empty())
					.map(move |address| Subscription::new(chain, address.trim(), guid))
			})
			.collect();
		subscriptions.sort();
		subscriptions.dedup();
		subscriptions
	}
}
