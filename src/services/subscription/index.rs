//! Address subscriptions backed by the key/value store.
//!
//! Each `{chain}-{address}` key holds the sorted set of subscribers watching
//! that address. A subscription may also name an extended public key; the
//! addresses derived from it are recorded separately and resolve back to the
//! key's subscribers on lookup.

use futures::{stream, StreamExt};
use std::{
	collections::{BTreeSet, HashMap},
	sync::Arc,
};
use tokio::sync::Mutex;

use crate::{
	models::{subscription_key, Subscription},
	services::{
		storage::{get_json, set_json, KeyValueStore},
		subscription::SubscriptionError,
	},
};

const SUBSCRIPTIONS_NAMESPACE: &str = "subscriptions";
/// `{chain}-{xpub}` to the set of derived addresses
const XPUBS_NAMESPACE: &str = "xpubs";
/// `{chain}-{address}` to the xpub it was derived from
const XPUB_ADDRESSES_NAMESPACE: &str = "xpub_addresses";

pub struct SubscriptionIndex {
	store: Arc<dyn KeyValueStore>,
	lookup_workers: usize,
	/// Serializes read-modify-write cycles on subscriber sets
	write_lock: Mutex<()>,
}

impl SubscriptionIndex {
	pub fn new(store: Arc<dyn KeyValueStore>, lookup_workers: usize) -> Self {
		Self {
			store,
			lookup_workers: lookup_workers.max(1),
			write_lock: Mutex::new(()),
		}
	}

	/// Subscribers of one address
	pub async fn subscribers(
		&self,
		chain: u32,
		address: &str,
	) -> Result<BTreeSet<String>, SubscriptionError> {
		self.read_set(SUBSCRIPTIONS_NAMESPACE, &subscription_key(chain, address))
			.await
	}

	/// Adds subscriptions, returning how many were not present yet
	pub async fn add(&self, subscriptions: &[Subscription]) -> Result<usize, SubscriptionError> {
		let _guard = self.write_lock.lock().await;
		let mut added = 0;
		for (key, subscribers) in group_by_key(subscriptions) {
			let mut set = self.read_set(SUBSCRIPTIONS_NAMESPACE, &key).await?;
			let before = set.len();
			set.extend(subscribers);
			if set.len() != before {
				added += set.len() - before;
				self.write_set(SUBSCRIPTIONS_NAMESPACE, &key, &set).await?;
			}
		}
		Ok(added)
	}

	/// Removes subscriptions, returning how many were present.
	///
	/// A key whose last subscriber goes away is removed from the store.
	pub async fn delete(&self, subscriptions: &[Subscription]) -> Result<usize, SubscriptionError> {
		let _guard = self.write_lock.lock().await;
		let mut removed = 0;
		for (key, subscribers) in group_by_key(subscriptions) {
			let mut set = self.read_set(SUBSCRIPTIONS_NAMESPACE, &key).await?;
			let before = set.len();
			for subscriber in &subscribers {
				set.remove(subscriber);
			}
			if set.len() == before {
				continue;
			}
			removed += before - set.len();
			if set.is_empty() {
				self.store
					.delete(SUBSCRIPTIONS_NAMESPACE, &key)
					.await
					.map_err(|e| storage_error("failed to delete subscription key", e, &key))?;
			} else {
				self.write_set(SUBSCRIPTIONS_NAMESPACE, &key, &set).await?;
			}
		}
		Ok(removed)
	}

	/// Records the addresses derived from `xpub`, returning how many were new.
	///
	/// Subscribers of the xpub are then found by lookups on any of these
	/// addresses. An empty derivation is rejected.
	pub async fn add_xpub(
		&self,
		chain: u32,
		xpub: &str,
		addresses: &[String],
	) -> Result<usize, SubscriptionError> {
		let derived: BTreeSet<String> = addresses
			.iter()
			.filter(|address| !address.is_empty() && address.as_str() != xpub)
			.cloned()
			.collect();
		if derived.is_empty() {
			return Err(SubscriptionError::xpub_error(
				"no addresses for xpub",
				None,
				Some(HashMap::from([
					("chain".to_string(), chain.to_string()),
					("xpub".to_string(), xpub.to_string()),
				])),
			));
		}

		let _guard = self.write_lock.lock().await;
		let key = subscription_key(chain, xpub);
		let mut known = self.read_set(XPUBS_NAMESPACE, &key).await?;
		let new: Vec<String> = derived.difference(&known).cloned().collect();
		if new.is_empty() {
			return Ok(0);
		}

		for address in &new {
			let reverse = subscription_key(chain, address);
			set_json(self.store.as_ref(), XPUB_ADDRESSES_NAMESPACE, &reverse, xpub)
				.await
				.map_err(|e| storage_error("failed to write xpub address", e, &reverse))?;
		}
		known.extend(new.iter().cloned());
		self.write_set(XPUBS_NAMESPACE, &key, &known).await?;
		Ok(new.len())
	}

	/// Addresses recorded for an xpub
	pub async fn xpub_addresses(
		&self,
		chain: u32,
		xpub: &str,
	) -> Result<BTreeSet<String>, SubscriptionError> {
		self.read_set(XPUBS_NAMESPACE, &subscription_key(chain, xpub))
			.await
	}

	/// Finds every subscription for the given addresses on one chain.
	///
	/// An address derived from a subscribed xpub yields the xpub's subscribers
	/// under that address. Reads fan out with at most `lookup_workers` in flight.
	/// An address whose read fails is logged and left out of the result instead
	/// of failing the whole lookup.
	pub async fn lookup<S: AsRef<str>>(&self, chain: u32, addresses: &[S]) -> Vec<Subscription> {
		let unique: BTreeSet<String> = addresses
			.iter()
			.map(AsRef::<str>::as_ref)
			.filter(|address| !address.is_empty())
			.map(str::to_string)
			.collect();

		let found: Vec<Vec<Subscription>> = stream::iter(unique)
			.map(|address: String| async move {
				match self.resolve(chain, &address).await {
					Ok(subscriptions) => subscriptions,
					Err(e) => {
						tracing::warn!(
							chain,
							address = %address,
							error = %e,
							"Subscription lookup failed, skipping address"
						);
						Vec::new()
					}
				}
			})
			.buffer_unordered(self.lookup_workers)
			.collect()
			.await;

		let mut subscriptions: Vec<Subscription> = found.into_iter().flatten().collect();
		subscriptions.sort();
		subscriptions.dedup();
		subscriptions
	}

	async fn resolve(
		&self,
		chain: u32,
		address: &str,
	) -> Result<Vec<Subscription>, SubscriptionError> {
		let mut subscribers = self.subscribers(chain, address).await?;

		let reverse = subscription_key(chain, address);
		let xpub = get_json::<String>(self.store.as_ref(), XPUB_ADDRESSES_NAMESPACE, &reverse)
			.await
			.map_err(|e| storage_error("failed to read xpub address", e, &reverse))?;
		if let Some(xpub) = xpub {
			subscribers.extend(self.subscribers(chain, &xpub).await?);
		}

		Ok(subscribers
			.into_iter()
			.map(|subscriber| Subscription::new(chain, address, subscriber))
			.collect())
	}

	async fn read_set(
		&self,
		namespace: &str,
		key: &str,
	) -> Result<BTreeSet<String>, SubscriptionError> {
		get_json::<BTreeSet<String>>(self.store.as_ref(), namespace, key)
			.await
			.map(Option::unwrap_or_default)
			.map_err(|e| storage_error("failed to read subscribers", e, key))
	}

	async fn write_set(
		&self,
		namespace: &str,
		key: &str,
		set: &BTreeSet<String>,
	) -> Result<(), SubscriptionError> {
		set_json(self.store.as_ref(), namespace, key, set)
			.await
			.map_err(|e| storage_error("failed to write subscribers", e, key))
	}
}

fn group_by_key(subscriptions: &[Subscription]) -> HashMap<String, Vec<String>> {
	let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
	for subscription in subscriptions {
		grouped
			.entry(subscription.key())
			.or_default()
			.push(subscription.subscriber.clone());
	}
	grouped
}

fn storage_error(msg: &str, error: anyhow::Error, key: &str) -> SubscriptionError {
	SubscriptionError::storage_error(
		msg,
		Some(error.into()),
		Some(HashMap::from([("key".to_string(), key.to_string())])),
	)
}
