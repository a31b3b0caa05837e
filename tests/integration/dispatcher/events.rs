use mockall::predicate;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

use crate::integration::mocks::{
	create_test_block, create_test_chain, create_test_tx, MockBlockSource, MockDurableQueue,
	BNB_RECEIVER, BNB_SENDER,
};
use chain_observer::{
	models::{Subscription, Tx},
	services::{
		dispatcher::{DispatchError, EventDispatcher, TxDispatcher},
		observer::{BacklogPlanner, BlockTracker, ChainPoller, PollerSettings},
		queue::{QueueError, QueueName},
		storage::InMemoryStore,
		subscription::SubscriptionIndex,
	},
};

async fn subscribed_index(store: Arc<InMemoryStore>) -> Arc<SubscriptionIndex> {
	let index = Arc::new(SubscriptionIndex::new(store, 4));
	index
		.add(&[
			Subscription::new(714, BNB_SENDER, "hook-1"),
			Subscription::new(714, BNB_RECEIVER, "hook-2"),
		])
		.await
		.unwrap();
	index
}

fn batch() -> Vec<Tx> {
	vec![create_test_tx(714, "tx-1", 10, BNB_SENDER, BNB_RECEIVER)]
}

#[tokio::test]
async fn test_every_event_is_published() {
	let mut queue = MockDurableQueue::new();
	queue
		.expect_publish()
		.with(predicate::eq(QueueName::TokenIndexerEvents), predicate::always())
		.times(1)
		.returning(|_, _| Ok(()));
	queue
		.expect_publish()
		.with(predicate::eq(QueueName::NotificationEvents), predicate::always())
		.times(2)
		.returning(|_, _| Ok(()));

	let index = subscribed_index(Arc::new(InMemoryStore::new())).await;
	let dispatcher = EventDispatcher::new(index, Arc::new(queue), 4);

	dispatcher.dispatch(&batch()).await.unwrap();
}

#[tokio::test]
async fn test_partial_publish_failure_is_reported() {
	let mut queue = MockDurableQueue::new();
	queue.expect_publish().returning(|queue, _| match queue {
		QueueName::NotificationEvents => Err(QueueError::publish_error("broker nack", None, None)),
		_ => Ok(()),
	});

	let index = subscribed_index(Arc::new(InMemoryStore::new())).await;
	let dispatcher = EventDispatcher::new(index, Arc::new(queue), 4);

	let error = dispatcher.dispatch(&batch()).await.unwrap_err();
	assert!(matches!(error, DispatchError::PublishError(_)));
	assert!(error.to_string().contains("2 of 3 events failed to publish"));
	assert!(error.to_string().contains("tx_ids=tx-1"));
}

#[tokio::test]
async fn test_publish_failure_keeps_tracker_in_place() {
	let mut queue = MockDurableQueue::new();
	queue
		.expect_publish()
		.returning(|_, _| Err(QueueError::connection_error("broker gone", None, None)));

	let mut source = MockBlockSource::new();
	source.expect_chain().return_const(create_test_chain(714, 1000));
	source.expect_current_height().returning(|| Ok(12));
	source.expect_block_by_height().returning(|height| {
		let txs = match height {
			11 => vec![create_test_tx(714, "tx-11", 11, BNB_SENDER, BNB_RECEIVER)],
			_ => vec![],
		};
		Ok(create_test_block(height, txs))
	});

	let store = Arc::new(InMemoryStore::new());
	let tracker = BlockTracker::new(store.clone());
	tracker.set(714, 10).await.unwrap();
	let index = subscribed_index(store).await;

	let poller = ChainPoller::new(
		Arc::new(source),
		BacklogPlanner::new(Duration::from_millis(250), Duration::from_secs(60), 100),
		tracker.clone(),
		Arc::new(EventDispatcher::new(index, Arc::new(queue), 4)),
		PollerSettings::default(),
	);

	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	assert!(poller.run_cycle(&shutdown_rx).await.is_err());
	assert_eq!(tracker.get(714).await.unwrap(), Some(10));
}
