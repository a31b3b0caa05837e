//! Address to asset associations.
//!
//! Records are keyed by prefixed address (`{chain}_{address}`). An address that
//! has a record is "known": its assets are kept current by the token indexer,
//! so the searcher answers from here instead of asking the chain.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};
use tokio::sync::Mutex;

use crate::{
	models::AssetsByAddress,
	services::storage::{get_json, set_json, KeyValueStore},
};

const ASSETS_NAMESPACE: &str = "assets";

/// Stored associations of one address
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AddressAssets {
	/// Asset id to the unix time the association was first seen
	pub assets: BTreeMap<String, i64>,
	pub first_seen: i64,
}

pub struct AssetStore {
	store: Arc<dyn KeyValueStore>,
	write_lock: Mutex<()>,
}

impl AssetStore {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self {
			store,
			write_lock: Mutex::new(()),
		}
	}

	pub async fn get(&self, prefixed_address: &str) -> anyhow::Result<Option<AddressAssets>> {
		get_json(self.store.as_ref(), ASSETS_NAMESPACE, prefixed_address)
			.await
			.with_context(|| format!("failed to read assets of {}", prefixed_address))
	}

	/// Merges associations into the stored records.
	///
	/// Existing associations keep their first-seen time, so replaying the same
	/// message changes nothing. An address listed with no assets still becomes
	/// known. Returns the number of new associations.
	pub async fn add_associations(
		&self,
		associations: &AssetsByAddress,
		now: i64,
	) -> anyhow::Result<usize> {
		let _guard = self.write_lock.lock().await;
		let mut added = 0;
		for (address, assets) in associations {
			let existing = self.get(address).await?;
			let is_new_address = existing.is_none();
			let mut record = existing.unwrap_or(AddressAssets {
				assets: BTreeMap::new(),
				first_seen: now,
			});

			let before = record.assets.len();
			for asset in assets {
				record.assets.entry(asset.clone()).or_insert(now);
			}
			let new_assets = record.assets.len() - before;

			if is_new_address || new_assets > 0 {
				set_json(self.store.as_ref(), ASSETS_NAMESPACE, address, &record)
					.await
					.with_context(|| format!("failed to write assets of {}", address))?;
			}
			added += new_assets;
		}
		Ok(added)
	}

	/// Splits addresses into known ones and the rest
	pub async fn partition_known(
		&self,
		prefixed_addresses: &[String],
	) -> anyhow::Result<(HashMap<String, AddressAssets>, Vec<String>)> {
		let mut known = HashMap::new();
		let mut unknown = Vec::new();
		for address in prefixed_addresses {
			match self.get(address).await? {
				Some(record) => {
					known.insert(address.clone(), record);
				}
				None => unknown.push(address.clone()),
			}
		}
		Ok((known, unknown))
	}
}

/// Asset ids first seen at or after `from`; addresses with none are left out
pub fn assets_since(known: &HashMap<String, AddressAssets>, from: i64) -> AssetsByAddress {
	known
		.iter()
		.filter_map(|(address, record)| {
			let assets: Vec<String> = record
				.assets
				.iter()
				.filter(|(_, seen)| **seen >= from)
				.map(|(asset, _)| asset.clone())
				.collect();
			(!assets.is_empty()).then(|| (address.clone(), assets))
		})
		.collect()
}
