use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::KeyValueStore;

#[derive(Default)]
pub struct InMemoryStore {
	namespaces: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
	async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
		Ok(self
			.namespaces
			.read()
			.await
			.get(namespace)
			.and_then(|entries| entries.get(key))
			.cloned())
	}

	async fn set(
		&self,
		namespace: &str,
		key: &str,
		value: serde_json::Value,
	) -> anyhow::Result<()> {
		self.namespaces
			.write()
			.await
			.entry(namespace.to_string())
			.or_default()
			.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()> {
		if let Some(entries) = self.namespaces.write().await.get_mut(namespace) {
			entries.remove(key);
		}
		Ok(())
	}

	async fn keys(&self, namespace: &str) -> anyhow::Result<Vec<String>> {
		let mut keys: Vec<String> = self
			.namespaces
			.read()
			.await
			.get(namespace)
			.map(|entries| entries.keys().cloned().collect())
			.unwrap_or_default();
		keys.sort();
		Ok(keys)
	}
}
