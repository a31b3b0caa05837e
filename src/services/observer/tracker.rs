//! Durable record of the last fully processed height per chain.
//!
//! Each chain has exactly one writer (its poller), so writes for one chain are
//! serialized by construction. The store handles concurrency across chains.

use std::{collections::HashMap, sync::Arc};

use crate::{
	services::{
		observer::ObserverError,
		storage::{get_json, set_json, KeyValueStore},
	},
	utils::metrics::LAST_PARSED_HEIGHT,
};

const TRACKER_NAMESPACE: &str = "tracker";

#[derive(Clone)]
pub struct BlockTracker {
	store: Arc<dyn KeyValueStore>,
}

impl BlockTracker {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Last processed height, `None` for a chain never processed before
	pub async fn get(&self, chain: u32) -> Result<Option<u64>, ObserverError> {
		get_json::<u64>(self.store.as_ref(), TRACKER_NAMESPACE, &chain.to_string())
			.await
			.map_err(|e| {
				ObserverError::storage_error(
					"failed to read tracked height",
					Some(e.into()),
					Some(metadata(chain, None)),
				)
			})
	}

	/// Stores `height` for `chain`.
	///
	/// A height lower than the stored one is rejected: it can only come from a
	/// scheduling bug and writing it would replay blocks forever.
	pub async fn set(&self, chain: u32, height: u64) -> Result<(), ObserverError> {
		if let Some(previous) = self.get(chain).await? {
			if height < previous {
				return Err(ObserverError::block_tracker_error(
					format!("refusing to move tracker back from {} to {}", previous, height),
					None,
					Some(metadata(chain, Some(height))),
				));
			}
		}

		set_json(self.store.as_ref(), TRACKER_NAMESPACE, &chain.to_string(), &height)
			.await
			.map_err(|e| {
				ObserverError::storage_error(
					"failed to write tracked height",
					Some(e.into()),
					Some(metadata(chain, Some(height))),
				)
			})?;

		LAST_PARSED_HEIGHT
			.with_label_values(&[&chain.to_string()])
			.set(height as f64);
		Ok(())
	}
}

fn metadata(chain: u32, height: Option<u64>) -> HashMap<String, String> {
	let mut metadata = HashMap::from([("chain".to_string(), chain.to_string())]);
	if let Some(height) = height {
		metadata.insert("height".to_string(), height.to_string());
	}
	metadata
}
