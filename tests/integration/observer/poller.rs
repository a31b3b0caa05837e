use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

use crate::integration::mocks::{
	create_test_block, create_test_chain, create_test_tx, MockBlockSource, BNB_RECEIVER,
	BNB_SENDER,
};
use chain_observer::{
	models::{NotificationDelivery, Subscription, TxType},
	services::{
		chain::ChainSourceError,
		dispatcher::EventDispatcher,
		observer::{BacklogPlanner, BlockTracker, ChainPoller, CycleOutcome, PollerSettings},
		queue::{declare_all, DurableQueue, InMemoryQueue, QueueName},
		storage::InMemoryStore,
		subscription::SubscriptionIndex,
	},
};

struct Harness {
	poller: ChainPoller,
	tracker: BlockTracker,
	index: Arc<SubscriptionIndex>,
	queue: Arc<InMemoryQueue>,
}

async fn harness(source: MockBlockSource) -> Harness {
	let store = Arc::new(InMemoryStore::new());
	let tracker = BlockTracker::new(store.clone());
	let index = Arc::new(SubscriptionIndex::new(store, 4));
	let queue = Arc::new(InMemoryQueue::new());
	declare_all(queue.as_ref()).await.unwrap();

	let dispatcher = Arc::new(EventDispatcher::new(index.clone(), queue.clone(), 4));
	let poller = ChainPoller::new(
		Arc::new(source),
		BacklogPlanner::new(Duration::from_millis(250), Duration::from_secs(3 * 60 * 60), 1000),
		tracker.clone(),
		dispatcher,
		PollerSettings {
			fetch_workers: 4,
			retry_max_attempts: 2,
			retry_base_interval: Duration::from_millis(1),
		},
	);

	Harness {
		poller,
		tracker,
		index,
		queue,
	}
}

fn source_with_tip(tip: u64) -> MockBlockSource {
	let mut source = MockBlockSource::new();
	source.expect_chain().return_const(create_test_chain(714, 3000));
	source.expect_current_height().returning(move || Ok(tip));
	source
}

#[tokio::test]
async fn test_cycle_dispatches_range_and_advances_tracker() {
	let mut source = source_with_tip(110);
	source
		.expect_block_by_height()
		.times(10)
		.returning(|height| {
			let txs = if height == 105 {
				vec![create_test_tx(714, "tx-105", 105, BNB_SENDER, BNB_RECEIVER)]
			} else {
				vec![]
			};
			Ok(create_test_block(height, txs))
		});

	let h = harness(source).await;
	h.tracker.set(714, 100).await.unwrap();
	h.index
		.add(&[Subscription::new(714, BNB_SENDER, "hook-1")])
		.await
		.unwrap();

	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	let outcome = h.poller.run_cycle(&shutdown_rx).await.unwrap();

	match outcome {
		CycleOutcome::Processed { plan, transactions } => {
			assert_eq!((plan.from, plan.to), (101, 110));
			assert_eq!(plan.poll_interval, Duration::from_millis(750));
			assert_eq!(transactions, 1);
		}
		other => panic!("unexpected outcome: {:?}", other),
	}
	assert_eq!(h.tracker.get(714).await.unwrap(), Some(110));

	assert_eq!(h.queue.ready_count(QueueName::NotificationEvents).await, 1);
	let delivery = h.queue.receive(QueueName::NotificationEvents).await.unwrap();
	let notification: NotificationDelivery = serde_json::from_slice(&delivery.payload).unwrap();
	assert_eq!(notification.subscriber, "hook-1");
	assert_eq!(notification.event.action, TxType::Transfer);
	assert_eq!(notification.event.result.id, "tx-105");
}

#[tokio::test]
async fn test_up_to_date_chain_fetches_nothing() {
	let mut source = source_with_tip(100);
	source.expect_block_by_height().never();

	let h = harness(source).await;
	h.tracker.set(714, 100).await.unwrap();

	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	let outcome = h.poller.run_cycle(&shutdown_rx).await.unwrap();

	assert_eq!(
		outcome,
		CycleOutcome::UpToDate {
			poll_interval: Duration::from_millis(750)
		}
	);
	assert_eq!(h.tracker.get(714).await.unwrap(), Some(100));
}

#[tokio::test]
async fn test_failed_fetch_keeps_tracker() {
	let mut source = source_with_tip(103);
	source.expect_block_by_height().returning(|height| match height {
		102 => Err(ChainSourceError::block_not_found(height, None, None)),
		_ => Ok(create_test_block(height, vec![])),
	});

	let h = harness(source).await;
	h.tracker.set(714, 100).await.unwrap();

	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	assert!(h.poller.run_cycle(&shutdown_rx).await.is_err());
	assert_eq!(h.tracker.get(714).await.unwrap(), Some(100));
	assert_eq!(h.queue.ready_count(QueueName::TokenIndexerEvents).await, 0);
}

#[tokio::test]
async fn test_shutdown_before_dispatch_cancels_cycle() {
	let mut source = source_with_tip(102);
	source
		.expect_block_by_height()
		.returning(|height| Ok(create_test_block(height, vec![])));

	let h = harness(source).await;
	h.tracker.set(714, 100).await.unwrap();

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	shutdown_tx.send(true).unwrap();

	assert_eq!(
		h.poller.run_cycle(&shutdown_rx).await.unwrap(),
		CycleOutcome::Cancelled
	);
	assert_eq!(h.tracker.get(714).await.unwrap(), Some(100));
}
