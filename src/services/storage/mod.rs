//! Durable key/value storage shared by the tracker, the subscription index and
//! the asset index.
//!
//! Values are JSON documents grouped by namespace. Two backends are provided:
//! - [`FileStore`]: one file per key, written atomically
//! - [`InMemoryStore`]: process-local, for tests and throwaway deployments

mod file;
mod memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use file::FileStore;
pub use memory::InMemoryStore;

/// Minimal namespaced key/value interface.
///
/// Implementations must allow concurrent access to different keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
	async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>>;

	async fn set(&self, namespace: &str, key: &str, value: serde_json::Value)
		-> anyhow::Result<()>;

	/// Removes a key; removing a missing key succeeds
	async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()>;

	async fn keys(&self, namespace: &str) -> anyhow::Result<Vec<String>>;
}

/// Reads and decodes a typed value
pub async fn get_json<T: DeserializeOwned>(
	store: &dyn KeyValueStore,
	namespace: &str,
	key: &str,
) -> anyhow::Result<Option<T>> {
	match store.get(namespace, key).await? {
		Some(value) => Ok(Some(serde_json::from_value(value)?)),
		None => Ok(None),
	}
}

/// Encodes and writes a typed value
pub async fn set_json<T: Serialize + ?Sized>(
	store: &dyn KeyValueStore,
	namespace: &str,
	key: &str,
	value: &T,
) -> anyhow::Result<()> {
	store
		.set(namespace, key, serde_json::to_value(value)?)
		.await
}
