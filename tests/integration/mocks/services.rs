use async_trait::async_trait;
use mockall::mock;

use chain_observer::{
	models::{Block, Chain, TokenAsset},
	services::{
		chain::{BlockSource, ChainSourceError, TokenSource},
		queue::{Delivery, DurableQueue, QueueError, QueueName},
		storage::KeyValueStore,
	},
};

mock! {
	pub BlockSource {}

	#[async_trait]
	impl BlockSource for BlockSource {
		fn chain(&self) -> &Chain;
		async fn current_height(&self) -> Result<u64, ChainSourceError>;
		async fn block_by_height(&self, height: u64) -> Result<Block, ChainSourceError>;
	}
}

mock! {
	pub TokenSource {}

	#[async_trait]
	impl TokenSource for TokenSource {
		fn chain(&self) -> &Chain;
		async fn tokens_by_address(&self, address: &str) -> Result<Vec<TokenAsset>, ChainSourceError>;
	}
}

mock! {
	pub DurableQueue {}

	#[async_trait]
	impl DurableQueue for DurableQueue {
		async fn declare(&self, queue: QueueName) -> Result<(), QueueError>;
		async fn publish(&self, queue: QueueName, payload: Vec<u8>) -> Result<(), QueueError>;
		async fn receive(&self, queue: QueueName) -> Result<Delivery, QueueError>;
		async fn ack(&self, queue: QueueName, tag: u64) -> Result<(), QueueError>;
		async fn nack(&self, queue: QueueName, tag: u64, requeue: bool) -> Result<(), QueueError>;
		async fn health_check(&self) -> Result<(), QueueError>;
		async fn reconnect(&self) -> Result<(), QueueError>;
	}
}

mock! {
	pub KeyValueStore {}

	#[async_trait]
	impl KeyValueStore for KeyValueStore {
		async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
		async fn set(&self, namespace: &str, key: &str, value: serde_json::Value) -> anyhow::Result<()>;
		async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()>;
		async fn keys(&self, namespace: &str) -> anyhow::Result<Vec<String>>;
	}
}
