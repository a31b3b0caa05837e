use crate::properties::strategies::subscriptions_strategy;
use chain_observer::services::{storage::InMemoryStore, subscription::SubscriptionIndex};
use proptest::{prelude::*, test_runner::Config};
use std::{collections::BTreeSet, sync::Arc};

fn runtime() -> tokio::runtime::Runtime {
	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.unwrap()
}

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_add_is_idempotent(subscriptions in subscriptions_strategy()) {
		let distinct: BTreeSet<_> = subscriptions.iter().cloned().collect();

		let (first, second) = runtime().block_on(async {
			let index = SubscriptionIndex::new(Arc::new(InMemoryStore::new()), 4);
			let first = index.add(&subscriptions).await.unwrap();
			let second = index.add(&subscriptions).await.unwrap();
			(first, second)
		});

		prop_assert_eq!(first, distinct.len());
		prop_assert_eq!(second, 0);
	}

	#[test]
	fn test_delete_undoes_add(subscriptions in subscriptions_strategy()) {
		let distinct: BTreeSet<_> = subscriptions.iter().cloned().collect();

		let (removed, leftovers) = runtime().block_on(async {
			let index = SubscriptionIndex::new(Arc::new(InMemoryStore::new()), 4);
			index.add(&subscriptions).await.unwrap();
			let removed = index.delete(&subscriptions).await.unwrap();

			let mut leftovers = 0;
			for subscription in &distinct {
				leftovers += index
					.subscribers(subscription.chain, &subscription.address)
					.await
					.unwrap()
					.len();
			}
			(removed, leftovers)
		});

		prop_assert_eq!(removed, distinct.len());
		prop_assert_eq!(leftovers, 0);
	}

	#[test]
	fn test_lookup_returns_exactly_added(subscriptions in subscriptions_strategy()) {
		let distinct: BTreeSet<_> = subscriptions.iter().cloned().collect();

		let found = runtime().block_on(async {
			let index = SubscriptionIndex::new(Arc::new(InMemoryStore::new()), 4);
			index.add(&subscriptions).await.unwrap();

			let mut found = BTreeSet::new();
			for chain in [0u32, 60, 714] {
				let addresses: Vec<&str> = distinct
					.iter()
					.filter(|s| s.chain == chain)
					.map(|s| s.address.as_str())
					.collect();
				found.extend(index.lookup(chain, &addresses).await);
			}
			found
		});

		prop_assert_eq!(found, distinct);
	}
}
