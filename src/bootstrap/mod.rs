//! Bootstrap module for wiring the pipeline together.
//!
//! Builds the stores, the chain registry, the queue and every service on top of
//! them, then starts pollers and consumers under one shutdown signal.
//!
//! # Services
//! - `ObserverService`: One poller per chain that serves blocks
//! - `EventDispatcher`: Matches batches against subscriptions and publishes events
//! - `TokenSearcher`: Resolves token holdings for address lists
//! - Consumers: Notifier, TokenIndexer, TokenSearcherConsumer, Subscriber
//! - `ConnectionSupervisor`: Keeps the broker connection alive

use std::{error::Error, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
	models::{Chain, ObserverConfig},
	services::{
		assets::AssetStore,
		chain::ChainRegistry,
		consumer::{
			ConsumerRunner, MessageHandler, Notifier, Subscriber, TokenIndexer, TokenSearcher,
			TokenSearcherConsumer,
		},
		dispatcher::EventDispatcher,
		notification::WebhookSender,
		observer::{BacklogPlanner, BlockTracker, ObserverService, PollerSettings},
		queue::{declare_all, ConnectionSupervisor, DurableQueue},
		storage::KeyValueStore,
		subscription::SubscriptionIndex,
	},
	utils::http::{create_retryable_http_client, HttpRetryConfig},
};

/// Type alias for bootstrap results
pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// Every long-lived service of a running process
pub struct Pipeline {
	pub registry: Arc<ChainRegistry>,
	pub queue: Arc<dyn DurableQueue>,
	pub index: Arc<SubscriptionIndex>,
	pub assets: Arc<AssetStore>,
	pub dispatcher: Arc<EventDispatcher>,
	pub observer: Arc<ObserverService>,
	/// Entry point for token holdings requests. The process serves no request
	/// API itself; a gateway embedding the library answers its token queries
	/// through this handle.
	pub token_searcher: Arc<TokenSearcher>,
	pub consumers: Vec<ConsumerRunner>,
	pub supervisor: Arc<ConnectionSupervisor>,
}

/// Builds the registry from chain configs, attaching gateway sources where
/// a chain declares an endpoint.
///
/// The gateway client does not retry on its own: block fetches already go
/// through `fetch_with_retry`, and token lookups log and skip a failed chain.
pub fn create_registry(chains: impl IntoIterator<Item = Chain>) -> Result<ChainRegistry> {
	let client = create_retryable_http_client(&HttpRetryConfig::without_retries())?;
	Ok(ChainRegistry::from_chains(chains, client)?)
}

/// Initializes all services over the given registry, store and queue.
///
/// Every queue is declared before anything publishes to it.
pub async fn initialize_services(
	config: &ObserverConfig,
	registry: Arc<ChainRegistry>,
	store: Arc<dyn KeyValueStore>,
	queue: Arc<dyn DurableQueue>,
) -> Result<Pipeline> {
	declare_all(queue.as_ref()).await?;

	let index = Arc::new(SubscriptionIndex::new(store.clone(), config.lookup_workers));
	let assets = Arc::new(AssetStore::new(store.clone()));

	let dispatcher = Arc::new(EventDispatcher::new(
		index.clone(),
		queue.clone(),
		config.publish_workers,
	));

	let observer = Arc::new(ObserverService::new(
		registry.clone(),
		BacklogPlanner::from_config(config),
		BlockTracker::new(store.clone()),
		dispatcher.clone(),
		PollerSettings::from_config(config),
	));

	let token_searcher = Arc::new(TokenSearcher::new(
		registry.clone(),
		assets.clone(),
		queue.clone(),
		config.lookup_workers,
	));

	let consumers = create_consumers(
		config,
		queue.clone(),
		registry.clone(),
		index.clone(),
		assets.clone(),
	)?;

	let supervisor = Arc::new(ConnectionSupervisor::new(
		queue.clone(),
		config.broker_check_interval(),
		config.broker_max_reconnects,
	));

	Ok(Pipeline {
		registry,
		queue,
		index,
		assets,
		dispatcher,
		observer,
		token_searcher,
		consumers,
		supervisor,
	})
}

/// Creates one runner per consumer queue
pub fn create_consumers(
	config: &ObserverConfig,
	queue: Arc<dyn DurableQueue>,
	registry: Arc<ChainRegistry>,
	index: Arc<SubscriptionIndex>,
	assets: Arc<AssetStore>,
) -> Result<Vec<ConsumerRunner>> {
	let client = create_retryable_http_client(&HttpRetryConfig::default())?;
	let sender = WebhookSender::new(client, config.notifier_secret.clone());

	let handlers: Vec<Arc<dyn MessageHandler>> = vec![
		Arc::new(Notifier::new(
			sender,
			config.notifier_webhook_url.clone(),
			config.delivery_history_size,
		)),
		Arc::new(TokenIndexer::new(assets.clone())),
		Arc::new(TokenSearcherConsumer::new(assets)),
		Arc::new(Subscriber::new(
			index,
			registry,
			config.subscriber_batch_limit,
		)),
	];

	Ok(handlers
		.into_iter()
		.map(|handler| {
			ConsumerRunner::new(
				queue.clone(),
				handler,
				config.consumer_prefetch,
				config.max_redeliveries,
			)
		})
		.collect())
}

impl Pipeline {
	/// Starts the pollers and spawns every consumer. Returns the consumer tasks.
	pub async fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<Vec<JoinHandle<()>>> {
		let pollers = self.observer.start().await?;
		tracing::info!(pollers = pollers, "Pollers started");

		let tasks = self
			.consumers
			.drain(..)
			.map(|runner| {
				let shutdown = shutdown.clone();
				tokio::spawn(async move { runner.run(shutdown).await })
			})
			.collect::<Vec<_>>();
		tracing::info!(consumers = tasks.len(), "Consumers started");

		Ok(tasks)
	}
}
