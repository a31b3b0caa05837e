use mockall::predicate;
use std::{collections::BTreeMap, sync::Arc};

use crate::integration::mocks::{create_test_chain, MockKeyValueStore, MockTokenSource};
use chain_observer::{
	models::{TokenAsset, TokensRequest},
	services::{
		assets::AssetStore,
		chain::{ChainDescriptor, ChainRegistry},
		consumer::{process_delivery, ConsumeOutcome, TokenSearcher, TokenSearcherConsumer},
		queue::{declare_all, DurableQueue, InMemoryQueue, QueueName},
		storage::{InMemoryStore, KeyValueStore},
	},
};

fn registry(source: MockTokenSource) -> Arc<ChainRegistry> {
	let mut registry = ChainRegistry::new();
	registry.register(
		ChainDescriptor::new(create_test_chain(60, 12000)).with_token_source(Arc::new(source)),
	);
	Arc::new(registry)
}

fn request(address: &str) -> TokensRequest {
	TokensRequest {
		addresses: BTreeMap::from([("60".to_string(), vec![address.to_string()])]),
		from: 0,
	}
}

#[tokio::test]
async fn test_chain_is_asked_only_until_address_is_known() {
	let mut source = MockTokenSource::new();
	source.expect_chain().return_const(create_test_chain(60, 12000));
	source
		.expect_tokens_by_address()
		.with(predicate::eq("0xcarol"))
		.times(1)
		.returning(|_| {
			Ok(vec![TokenAsset {
				chain: 60,
				token_id: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
				symbol: "USDT".to_string(),
				name: "Tether".to_string(),
				decimals: 6,
			}])
		});

	let queue = Arc::new(InMemoryQueue::new());
	declare_all(queue.as_ref()).await.unwrap();
	let assets = Arc::new(AssetStore::new(Arc::new(InMemoryStore::new())));
	let searcher = TokenSearcher::new(registry(source), assets.clone(), queue.clone(), 4);

	let expected = BTreeMap::from([(
		"60_0xcarol".to_string(),
		vec!["c60_t0xdac17f958d2ee523a2206206994597c13d831ec7".to_string()],
	)]);
	assert_eq!(searcher.handle_tokens_request(&request("0xcarol")).await.unwrap(), expected);

	let delivery = queue.receive(QueueName::TokenSearcherEvents).await.unwrap();
	let consumer = TokenSearcherConsumer::new(assets);
	assert_eq!(
		process_delivery(queue.as_ref(), &consumer, delivery, 3).await,
		ConsumeOutcome::Acked
	);

	assert_eq!(searcher.handle_tokens_request(&request("0xcarol")).await.unwrap(), expected);
	assert_eq!(queue.ready_count(QueueName::TokenSearcherEvents).await, 0);
}

#[tokio::test]
async fn test_storage_failure_fails_request() {
	let mut source = MockTokenSource::new();
	source.expect_chain().return_const(create_test_chain(60, 12000));
	source.expect_tokens_by_address().never();

	let mut store = MockKeyValueStore::new();
	store
		.expect_get()
		.returning(|_, _| Err(anyhow::anyhow!("disk unavailable")));

	let store: Arc<dyn KeyValueStore> = Arc::new(store);
	let searcher = TokenSearcher::new(
		registry(source),
		Arc::new(AssetStore::new(store)),
		Arc::new(InMemoryQueue::new()),
		4,
	);

	assert!(searcher.handle_tokens_request(&request("0xcarol")).await.is_err());
}
