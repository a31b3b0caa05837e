use std::{sync::Arc, time::Duration};

use crate::integration::mocks::{create_test_block, create_test_chain, MockBlockSource};
use chain_observer::{
	services::{
		chain::{ChainDescriptor, ChainRegistry, ChainSourceError},
		dispatcher::EventDispatcher,
		observer::{BacklogPlanner, BlockTracker, ObserverService, PollerSettings},
		queue::{declare_all, InMemoryQueue},
		storage::InMemoryStore,
		subscription::SubscriptionIndex,
	},
};

fn healthy_source(chain_id: u32, tip: u64) -> MockBlockSource {
	let mut source = MockBlockSource::new();
	source.expect_chain().return_const(create_test_chain(chain_id, 1000));
	source.expect_current_height().returning(move || Ok(tip));
	source
		.expect_block_by_height()
		.returning(|height| Ok(create_test_block(height, vec![])));
	source
}

fn broken_source(chain_id: u32) -> MockBlockSource {
	let mut source = MockBlockSource::new();
	source.expect_chain().return_const(create_test_chain(chain_id, 1000));
	source.expect_current_height().returning(|| {
		Err(ChainSourceError::request_error("connection reset", None, None))
	});
	source.expect_block_by_height().never();
	source
}

async fn service(registry: ChainRegistry) -> (ObserverService, BlockTracker) {
	let store = Arc::new(InMemoryStore::new());
	let tracker = BlockTracker::new(store.clone());
	let queue = Arc::new(InMemoryQueue::new());
	declare_all(queue.as_ref()).await.unwrap();
	let index = Arc::new(SubscriptionIndex::new(store, 4));

	let service = ObserverService::new(
		Arc::new(registry),
		BacklogPlanner::new(Duration::from_millis(50), Duration::from_secs(10), 100),
		tracker.clone(),
		Arc::new(EventDispatcher::new(index, queue, 4)),
		PollerSettings {
			fetch_workers: 2,
			retry_max_attempts: 1,
			retry_base_interval: Duration::from_millis(1),
		},
	);
	(service, tracker)
}

async fn wait_for_height(tracker: &BlockTracker, chain: u32, height: u64) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while tracker.get(chain).await.unwrap() != Some(height) {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("tracker did not reach the expected height");
}

#[tokio::test]
async fn test_failing_chain_does_not_block_others() {
	let mut registry = ChainRegistry::new();
	registry.register(
		ChainDescriptor::new(create_test_chain(714, 1000))
			.with_block_source(Arc::new(healthy_source(714, 20))),
	);
	registry.register(
		ChainDescriptor::new(create_test_chain(60, 1000))
			.with_block_source(Arc::new(broken_source(60))),
	);
	registry.register(ChainDescriptor::new(create_test_chain(0, 1000)));

	let (service, tracker) = service(registry).await;
	assert_eq!(service.start().await.unwrap(), 2);
	assert_eq!(service.active_chains().await, vec![60, 714]);

	wait_for_height(&tracker, 714, 20).await;
	assert_eq!(tracker.get(60).await.unwrap(), None);

	service.stop_all().await;
	assert!(service.active_chains().await.is_empty());
}

#[tokio::test]
async fn test_pollers_can_be_stopped_individually() {
	let mut registry = ChainRegistry::new();
	for chain_id in [714, 60] {
		registry.register(
			ChainDescriptor::new(create_test_chain(chain_id, 1000))
				.with_block_source(Arc::new(healthy_source(chain_id, 5))),
		);
	}

	let (service, _) = service(registry).await;
	service.start().await.unwrap();

	service.stop_chain_poller(714).await.unwrap();
	assert_eq!(service.active_chains().await, vec![60]);
	assert!(service.poller_state(714).await.is_none());

	assert!(service.start_chain_poller(60).await.is_err());
	service.start_chain_poller(714).await.unwrap();
	assert_eq!(service.active_chains().await, vec![60, 714]);

	service.stop_all().await;
}
