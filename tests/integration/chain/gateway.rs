use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

use crate::integration::mocks::{BNB_RECEIVER, BNB_SENDER};
use chain_observer::{
	bootstrap::{create_registry, initialize_services},
	models::{Capability, Chain, NotificationDelivery, ObserverConfig, Subscription, TxType},
	services::{
		consumer::{process_delivery, ConsumeOutcome, Notifier, TokenIndexer},
		notification::WebhookSender,
		observer::{
			fetch_with_retry, BacklogPlanner, BlockTracker, ChainPoller, CycleOutcome, PollerSettings,
		},
		queue::{DurableQueue, InMemoryQueue, QueueName},
		storage::InMemoryStore,
	},
	utils::http::{create_retryable_http_client, HttpRetryConfig},
};

fn binance(endpoint: String) -> Chain {
	Chain {
		id: 714,
		handle: "binance".to_string(),
		symbol: "BNB".to_string(),
		name: "BNB Beacon Chain".to_string(),
		decimals: 8,
		block_time_ms: 3000,
		min_confirmations: 0,
		endpoint: Some(endpoint),
		capabilities: vec![Capability::Blocks],
	}
}

fn token_transfer_json() -> serde_json::Value {
	json!({
		"id": "95CF63FAA27579A9B6AF84EF8B2DFEAC29627479E9C98E7F5AE4535E213FA4C9",
		"coin": 714,
		"from": BNB_SENDER,
		"to": BNB_RECEIVER,
		"fee": "125000",
		"date": 1555117625,
		"block": 105,
		"status": "completed",
		"sequence": 0,
		"type": "token_transfer",
		"metadata": {
			"name": "YLC",
			"symbol": "YLC",
			"token_id": "YLC-D8B",
			"decimals": 8,
			"value": "210572645",
			"from": BNB_SENDER,
			"to": BNB_RECEIVER
		}
	})
}

#[tokio::test]
async fn test_gateway_block_reaches_subscriber_webhook() {
	let mut gateway = mockito::Server::new_async().await;
	let _height = gateway
		.mock("GET", "/binance/height")
		.with_status(200)
		.with_body(r#"{"height": 110}"#)
		.create_async()
		.await;
	let mut block_mocks = Vec::new();
	for height in 101..=110u64 {
		let txs = if height == 105 {
			vec![token_transfer_json()]
		} else {
			vec![]
		};
		block_mocks.push(
			gateway
				.mock("GET", format!("/binance/blocks/{}", height).as_str())
				.with_status(200)
				.with_body(json!({"number": height, "txs": txs}).to_string())
				.expect(1)
				.create_async()
				.await,
		);
	}

	let mut webhook = mockito::Server::new_async().await;
	let hook = webhook
		.mock("POST", "/hook")
		.match_body(mockito::Matcher::PartialJsonString(
			r#"{"action": "token_transfer", "result": {"block": 105}}"#.to_string(),
		))
		.with_status(200)
		.expect(1)
		.create_async()
		.await;

	let registry =
		Arc::new(create_registry(vec![binance(format!("{}/binance/", gateway.url()))]).unwrap());
	let store = Arc::new(InMemoryStore::new());
	let queue = Arc::new(InMemoryQueue::new());
	let config = ObserverConfig {
		retry_base_interval_ms: 1,
		..ObserverConfig::default()
	};
	let pipeline = initialize_services(&config, registry.clone(), store.clone(), queue.clone())
		.await
		.unwrap();

	let subscriber = format!("{}/hook", webhook.url());
	pipeline
		.index
		.add(&[Subscription::new(714, BNB_SENDER, subscriber.as_str())])
		.await
		.unwrap();
	let tracker = BlockTracker::new(store);
	tracker.set(714, 100).await.unwrap();

	let poller = ChainPoller::new(
		registry.block_source(714).unwrap(),
		BacklogPlanner::from_config(&config),
		tracker.clone(),
		pipeline.dispatcher.clone(),
		PollerSettings::from_config(&config),
	);
	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	match poller.run_cycle(&shutdown_rx).await.unwrap() {
		CycleOutcome::Processed { plan, transactions } => {
			assert_eq!((plan.from, plan.to), (101, 110));
			assert_eq!(plan.poll_interval, Duration::from_millis(750));
			assert_eq!(transactions, 1);
		}
		other => panic!("unexpected outcome: {:?}", other),
	}
	assert_eq!(tracker.get(714).await.unwrap(), Some(110));
	for mock in &block_mocks {
		mock.assert_async().await;
	}

	assert_eq!(queue.ready_count(QueueName::NotificationEvents).await, 1);
	let delivery = queue.receive(QueueName::NotificationEvents).await.unwrap();
	let decoded: NotificationDelivery = serde_json::from_slice(&delivery.payload).unwrap();
	assert_eq!(decoded.event.action, TxType::TokenTransfer);

	let client = create_retryable_http_client(&HttpRetryConfig::without_retries()).unwrap();
	let notifier = Notifier::new(WebhookSender::new(client, None), None, 100);
	let outcome = process_delivery(queue.as_ref(), &notifier, delivery, 5).await;
	assert_eq!(outcome, ConsumeOutcome::Acked);
	hook.assert_async().await;

	let indexer_delivery = queue.receive(QueueName::TokenIndexerEvents).await.unwrap();
	let indexer = TokenIndexer::new(pipeline.assets.clone());
	assert_eq!(
		process_delivery(queue.as_ref(), &indexer, indexer_delivery, 5).await,
		ConsumeOutcome::Acked
	);
}

#[tokio::test]
async fn test_failing_block_is_requested_once_per_attempt() {
	let mut gateway = mockito::Server::new_async().await;
	let block = gateway
		.mock("GET", "/binance/blocks/7")
		.with_status(503)
		.expect(3)
		.create_async()
		.await;

	let registry = create_registry(vec![binance(format!("{}/binance", gateway.url()))]).unwrap();
	let source = registry.block_source(714).unwrap();

	let result = fetch_with_retry(7, 3, Duration::from_millis(1), |height| {
		let source = source.clone();
		async move { source.block_by_height(height).await }
	})
	.await;

	assert!(result.is_err());
	block.assert_async().await;
}
