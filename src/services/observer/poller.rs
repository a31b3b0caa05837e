//! Per-chain polling loop.
//!
//! Each cycle walks `Fetching -> Batching -> Dispatching -> Tracking` and then
//! idles for the planned poll interval. A failure at any stage abandons the
//! cycle without touching the tracker, so the same range is planned again on
//! the next tick.

use futures::{stream, StreamExt};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::{
	models::{Chain, ObserverConfig},
	services::{
		chain::{BlockSource, ChainSourceError},
		dispatcher::TxDispatcher,
		observer::{
			batch::{convert_to_batch, TransactionsBatch},
			fetch_with_retry, BacklogPlan, BacklogPlanner, BlockTracker, ObserverError,
		},
	},
	utils::metrics::{record_cycle_failure, record_cycle_success},
};

/// Observable position of a poller in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
	Idle,
	Fetching,
	Batching,
	Dispatching,
	Tracking,
	Stopped,
}

/// Knobs shared by every poller
#[derive(Debug, Clone)]
pub struct PollerSettings {
	pub fetch_workers: usize,
	pub retry_max_attempts: u32,
	pub retry_base_interval: Duration,
}

impl PollerSettings {
	pub fn from_config(config: &ObserverConfig) -> Self {
		Self {
			fetch_workers: config.fetch_workers.max(1),
			retry_max_attempts: config.retry_max_attempts,
			retry_base_interval: config.retry_base_interval(),
		}
	}
}

impl Default for PollerSettings {
	fn default() -> Self {
		Self::from_config(&ObserverConfig::default())
	}
}

/// What a single cycle achieved
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
	/// Nothing new past the tracked height
	UpToDate { poll_interval: Duration },
	/// The range was dispatched and the tracker now points at `plan.to`
	Processed { plan: BacklogPlan, transactions: usize },
	/// Shutdown was requested before dispatch started; the tracker is untouched
	Cancelled,
}

pub struct ChainPoller {
	source: Arc<dyn BlockSource>,
	planner: BacklogPlanner,
	tracker: BlockTracker,
	dispatcher: Arc<dyn TxDispatcher>,
	settings: PollerSettings,
	state: watch::Sender<PollerState>,
}

impl ChainPoller {
	pub fn new(
		source: Arc<dyn BlockSource>,
		planner: BacklogPlanner,
		tracker: BlockTracker,
		dispatcher: Arc<dyn TxDispatcher>,
		settings: PollerSettings,
	) -> Self {
		let (state, _) = watch::channel(PollerState::Idle);
		Self {
			source,
			planner,
			tracker,
			dispatcher,
			settings,
			state,
		}
	}

	pub fn chain(&self) -> &Chain {
		self.source.chain()
	}

	pub fn state(&self) -> watch::Receiver<PollerState> {
		self.state.subscribe()
	}

	fn set_state(&self, state: PollerState) {
		self.state.send_replace(state);
	}

	/// Runs cycles until `shutdown` flips to true or its sender goes away.
	///
	/// Shutdown is observed while idling, while fetching and right before
	/// dispatching; a cycle that already started dispatching runs through
	/// tracking first.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		let chain = self.chain().clone();
		info!(chain = chain.id, handle = %chain.handle, "Starting chain poller");

		while !*shutdown.borrow() {
			let poll_interval = match self.run_cycle(&shutdown).await {
				Ok(CycleOutcome::UpToDate { poll_interval }) => poll_interval,
				Ok(CycleOutcome::Processed { plan, .. }) => plan.poll_interval,
				Ok(CycleOutcome::Cancelled) => break,
				Err(e) => {
					tracing::error!(chain = chain.id, error = %e, "Polling cycle aborted");
					self.planner.poll_interval(&chain)
				}
			};

			self.set_state(PollerState::Idle);
			tokio::select! {
				_ = tokio::time::sleep(poll_interval) => {}
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				}
			}
		}

		self.set_state(PollerState::Stopped);
		info!(chain = chain.id, handle = %chain.handle, "Chain poller stopped");
	}

	/// Executes one full cycle.
	#[instrument(skip_all, fields(chain = self.source.chain().id))]
	pub async fn run_cycle(
		&self,
		shutdown: &watch::Receiver<bool>,
	) -> Result<CycleOutcome, ObserverError> {
		let chain = self.chain();
		self.set_state(PollerState::Fetching);

		let plan = self.plan().await?;
		if plan.is_empty() {
			tracing::debug!(from = plan.from, to = plan.to, "Chain is up to date");
			return Ok(CycleOutcome::UpToDate {
				poll_interval: plan.poll_interval,
			});
		}

		let batch = TransactionsBatch::new();
		let fetch_range = stream::iter(plan.heights())
			.map(|height| {
				let batch = &batch;
				async move {
					let block = fetch_with_retry(
						height,
						self.settings.retry_max_attempts,
						self.settings.retry_base_interval,
						|h| self.source.block_by_height(h),
					)
					.await?;
					batch
						.add(height, convert_to_batch(std::slice::from_ref(&block)))
						.await;
					Ok(height)
				}
			})
			.buffer_unordered(self.settings.fetch_workers.max(1))
			.collect::<Vec<Result<u64, ChainSourceError>>>();

		let results = tokio::select! {
			results = fetch_range => results,
			_ = shutdown_requested(shutdown.clone()) => {
				info!(from = plan.from, to = plan.to, "Shutdown requested, abandoning fetch");
				return Ok(CycleOutcome::Cancelled);
			}
		};

		if let Some(first) = results.into_iter().find_map(Result::err) {
			record_cycle_failure(chain.id, "fetch");
			return Err(ObserverError::network_error(
				format!("failed to fetch blocks {}..={}", plan.from, plan.to),
				Some(Box::new(first)),
				Some(range_metadata(chain, &plan)),
			));
		}

		self.set_state(PollerState::Batching);
		let txs = batch.into_txs();

		if *shutdown.borrow() {
			info!(from = plan.from, to = plan.to, "Shutdown requested, dropping fetched range");
			return Ok(CycleOutcome::Cancelled);
		}

		self.set_state(PollerState::Dispatching);
		if let Err(e) = self.dispatcher.dispatch(&txs).await {
			record_cycle_failure(chain.id, "dispatch");
			return Err(ObserverError::processing_error(
				"failed to dispatch batch",
				Some(Box::new(e)),
				Some(range_metadata(chain, &plan)),
			));
		}

		self.set_state(PollerState::Tracking);
		if let Err(e) = self.tracker.set(chain.id, plan.to).await {
			record_cycle_failure(chain.id, "tracking");
			return Err(e);
		}

		record_cycle_success(chain.id, plan.len(), txs.len(), plan.to);
		info!(
			from = plan.from,
			to = plan.to,
			transactions = txs.len(),
			"Processed block range"
		);

		Ok(CycleOutcome::Processed {
			plan,
			transactions: txs.len(),
		})
	}

	/// Reads the tracker and the confirmed tip, then plans the range
	async fn plan(&self) -> Result<BacklogPlan, ObserverError> {
		let chain = self.chain();

		let current = fetch_with_retry(
			0,
			self.settings.retry_max_attempts,
			self.settings.retry_base_interval,
			|_| self.source.current_height(),
		)
		.await
		.map_err(|e| {
			record_cycle_failure(chain.id, "height");
			ObserverError::network_error(
				"failed to fetch current height",
				Some(Box::new(e)),
				Some(HashMap::from([("chain".to_string(), chain.id.to_string())])),
			)
		})?;

		let last_parsed = self.tracker.get(chain.id).await.inspect_err(|_| {
			record_cycle_failure(chain.id, "storage");
		})?;

		let confirmed = current.saturating_sub(chain.min_confirmations);
		Ok(self.planner.plan_range(last_parsed, confirmed, chain))
	}
}

/// Resolves once shutdown is signalled. A dropped sender never resolves here;
/// `run` notices it between cycles.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
	if shutdown.wait_for(|stop| *stop).await.is_err() {
		std::future::pending::<()>().await;
	}
}

fn range_metadata(chain: &Chain, plan: &BacklogPlan) -> HashMap<String, String> {
	HashMap::from([
		("chain".to_string(), chain.id.to_string()),
		("from".to_string(), plan.from.to_string()),
		("to".to_string(), plan.to.to_string()),
	])
}
