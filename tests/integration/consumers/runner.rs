use async_trait::async_trait;
use serde_json::json;
use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};
use tokio::sync::watch;

use crate::integration::mocks::BNB_SENDER;
use chain_observer::services::{
	chain::ChainRegistry,
	consumer::{ConsumerError, ConsumerRunner, MessageHandler, Subscriber},
	queue::{declare_all, DurableQueue, InMemoryQueue, QueueName},
	storage::InMemoryStore,
	subscription::SubscriptionIndex,
};

async fn queue() -> Arc<InMemoryQueue> {
	let queue = Arc::new(InMemoryQueue::new());
	declare_all(queue.as_ref()).await.unwrap();
	queue
}

async fn eventually<F, Fut>(check: F)
where
	F: Fn() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	tokio::time::timeout(Duration::from_secs(5), async {
		while !check().await {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("condition was not reached in time");
}

#[tokio::test]
async fn test_subscription_events_reach_the_index() {
	let queue = queue().await;
	let index = Arc::new(SubscriptionIndex::new(Arc::new(InMemoryStore::new()), 4));
	let runner = ConsumerRunner::new(
		queue.clone(),
		Arc::new(Subscriber::new(index.clone(), Arc::new(ChainRegistry::new()), 2)),
		4,
		3,
	);

	let event = json!({
		"new_subscriptions": {"714": [BNB_SENDER], "60": ["0xa", "0xb", "0xc"]},
		"old_subscriptions": {},
		"guid": "hook-1",
		"operation": "AddSubscription"
	});
	queue
		.publish(QueueName::SubscriptionEvents, event.to_string().into_bytes())
		.await
		.unwrap();
	queue
		.publish(QueueName::SubscriptionEvents, b"garbage".to_vec())
		.await
		.unwrap();

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let task = tokio::spawn(async move { runner.run(shutdown_rx).await });

	eventually(|| {
		let queue = queue.clone();
		async move {
			queue.ready_count(QueueName::SubscriptionEvents).await == 0
				&& queue.unacked_count(QueueName::SubscriptionEvents).await == 0
		}
	})
	.await;

	assert_eq!(index.subscribers(714, BNB_SENDER).await.unwrap().len(), 1);
	assert_eq!(index.subscribers(60, "0xc").await.unwrap().len(), 1);

	shutdown_tx.send(true).unwrap();
	task.await.unwrap();
}

struct AlwaysFailing {
	calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MessageHandler for AlwaysFailing {
	fn queue(&self) -> QueueName {
		QueueName::NotificationEvents
	}

	async fn handle(&self, _payload: &[u8]) -> Result<(), ConsumerError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		Err(ConsumerError::processing_error("webhook down", None, None))
	}
}

#[tokio::test]
async fn test_failing_message_is_dropped_after_max_redeliveries() {
	let queue = queue().await;
	let calls = Arc::new(AtomicUsize::new(0));
	let runner = ConsumerRunner::new(
		queue.clone(),
		Arc::new(AlwaysFailing {
			calls: calls.clone(),
		}),
		1,
		2,
	);
	queue
		.publish(QueueName::NotificationEvents, b"{}".to_vec())
		.await
		.unwrap();

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let task = tokio::spawn(async move { runner.run(shutdown_rx).await });

	eventually(|| {
		let calls = calls.clone();
		async move { calls.load(Ordering::SeqCst) == 3 }
	})
	.await;
	eventually(|| {
		let queue = queue.clone();
		async move {
			queue.ready_count(QueueName::NotificationEvents).await == 0
				&& queue.unacked_count(QueueName::NotificationEvents).await == 0
		}
	})
	.await;

	shutdown_tx.send(true).unwrap();
	task.await.unwrap();
	assert_eq!(calls.load(Ordering::SeqCst), 3);
}
