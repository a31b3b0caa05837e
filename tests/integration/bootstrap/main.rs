use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

use chain_observer::{
	bootstrap::{create_registry, initialize_services},
	models::{Capability, ObserverConfig, Subscription},
	repositories::ChainService,
	services::{
		observer::BlockTracker,
		queue::InMemoryQueue,
		storage::FileStore,
	},
};

fn write_config(dir: &TempDir) {
	let chains = dir.path().join("chains");
	std::fs::create_dir_all(&chains).unwrap();
	std::fs::write(
		chains.join("binance.json"),
		r#"{"id": 714, "handle": "binance", "symbol": "BNB", "name": "BNB Beacon Chain",
		"decimals": 8, "block_time_ms": 500, "endpoint": "http://127.0.0.1:9/binance",
		"capabilities": ["blocks", "tokens"]}"#,
	)
	.unwrap();
	std::fs::write(
		chains.join("cosmos.json"),
		r#"{"id": 118, "handle": "cosmos", "symbol": "ATOM", "name": "Cosmos Hub"}"#,
	)
	.unwrap();
	std::fs::write(
		dir.path().join("observer.json"),
		r#"{"max_backlog_blocks": 10, "consumer_prefetch": 2}"#,
	)
	.unwrap();
}

#[test]
fn test_configs_build_registry() {
	let dir = TempDir::new().unwrap();
	write_config(&dir);

	let config = ObserverConfig::load(Some(dir.path().join("observer.json").as_path())).unwrap();
	assert_eq!(config.max_backlog_blocks, 10);
	assert_eq!(config.consumer_prefetch, 2);
	assert_eq!(config.fetch_workers, ObserverConfig::default().fetch_workers);

	let chains = ChainService::new(Some(dir.path().join("chains").as_path())).unwrap();
	let registry = create_registry(chains.get_all().into_values()).unwrap();

	assert_eq!(registry.len(), 2);
	assert!(registry.supports(714, Capability::Blocks));
	assert!(registry.supports(714, Capability::Tokens));
	assert!(!registry.supports(118, Capability::Blocks));
}

#[tokio::test]
async fn test_state_survives_restart_with_file_store() {
	let dir = TempDir::new().unwrap();
	let storage = dir.path().join("data");

	{
		let store = Arc::new(FileStore::new(&storage));
		let pipeline = initialize_services(
			&ObserverConfig::default(),
			Arc::new(create_registry(vec![]).unwrap()),
			store.clone(),
			Arc::new(InMemoryQueue::new()),
		)
		.await
		.unwrap();
		pipeline
			.index
			.add(&[Subscription::new(714, "tbnb1", "hook-1")])
			.await
			.unwrap();
		BlockTracker::new(store).set(714, 42).await.unwrap();
	}

	let store = Arc::new(FileStore::new(&storage));
	let pipeline = initialize_services(
		&ObserverConfig::default(),
		Arc::new(create_registry(vec![]).unwrap()),
		store.clone(),
		Arc::new(InMemoryQueue::new()),
	)
	.await
	.unwrap();

	assert_eq!(BlockTracker::new(store).get(714).await.unwrap(), Some(42));
	assert_eq!(pipeline.index.subscribers(714, "tbnb1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pipeline_starts_and_stops_cleanly() {
	let dir = TempDir::new().unwrap();
	let mut pipeline = initialize_services(
		&ObserverConfig::default(),
		Arc::new(create_registry(vec![]).unwrap()),
		Arc::new(FileStore::new(dir.path())),
		Arc::new(InMemoryQueue::new()),
	)
	.await
	.unwrap();

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let consumers = pipeline.start(shutdown_rx).await.unwrap();
	assert_eq!(consumers.len(), 4);

	shutdown_tx.send(true).unwrap();
	pipeline.observer.stop_all().await;
	for consumer in consumers {
		consumer.await.unwrap();
	}
}
