//! Lifecycle of the per-chain pollers.
//!
//! One task per chain with the `Blocks` capability. Chains never share a task,
//! so a slow or failing chain cannot delay the others.

use log::{error, info};
use std::{collections::HashMap, sync::Arc};
use tokio::{
	sync::{watch, Mutex},
	task::JoinHandle,
};

use crate::{
	models::Capability,
	services::{
		chain::ChainRegistry,
		dispatcher::TxDispatcher,
		observer::{
			BacklogPlanner, BlockTracker, ChainPoller, ObserverError, PollerSettings, PollerState,
		},
	},
	utils::metrics::CHAINS_OBSERVED,
};

struct PollerHandle {
	shutdown: watch::Sender<bool>,
	state: watch::Receiver<PollerState>,
	task: JoinHandle<()>,
}

pub struct ObserverService {
	registry: Arc<ChainRegistry>,
	planner: BacklogPlanner,
	tracker: BlockTracker,
	dispatcher: Arc<dyn TxDispatcher>,
	settings: PollerSettings,
	active: Mutex<HashMap<u32, PollerHandle>>,
}

impl ObserverService {
	pub fn new(
		registry: Arc<ChainRegistry>,
		planner: BacklogPlanner,
		tracker: BlockTracker,
		dispatcher: Arc<dyn TxDispatcher>,
		settings: PollerSettings,
	) -> Self {
		Self {
			registry,
			planner,
			tracker,
			dispatcher,
			settings,
			active: Mutex::new(HashMap::new()),
		}
	}

	/// Starts a poller for every chain that can serve blocks
	pub async fn start(&self) -> Result<usize, ObserverError> {
		let chain_ids: Vec<u32> = self
			.registry
			.block_sources()
			.iter()
			.map(|source| source.chain().id)
			.collect();

		if chain_ids.is_empty() {
			info!("No chain provides blocks, observer will not start");
			return Ok(0);
		}

		for chain_id in &chain_ids {
			self.start_chain_poller(*chain_id).await?;
		}

		info!("Observer started for {} chains", chain_ids.len());
		Ok(chain_ids.len())
	}

	pub async fn start_chain_poller(&self, chain_id: u32) -> Result<(), ObserverError> {
		let metadata = HashMap::from([("chain".to_string(), chain_id.to_string())]);
		let source = self.registry.block_source(chain_id).ok_or_else(|| {
			ObserverError::scheduler_error(
				format!("chain does not support {:?}", Capability::Blocks),
				None,
				Some(metadata.clone()),
			)
		})?;

		let mut active = self.active.lock().await;
		if active.contains_key(&chain_id) {
			return Err(ObserverError::scheduler_error(
				"poller already running",
				None,
				Some(metadata),
			));
		}

		let poller = ChainPoller::new(
			source,
			self.planner.clone(),
			self.tracker.clone(),
			self.dispatcher.clone(),
			self.settings.clone(),
		);
		let state = poller.state();
		let (shutdown, shutdown_rx) = watch::channel(false);
		let task = tokio::spawn(async move { poller.run(shutdown_rx).await });

		active.insert(
			chain_id,
			PollerHandle {
				shutdown,
				state,
				task,
			},
		);
		CHAINS_OBSERVED.set(active.len() as f64);
		Ok(())
	}

	/// Signals one poller and waits for it to exit
	pub async fn stop_chain_poller(&self, chain_id: u32) -> Result<(), ObserverError> {
		let handle = self.active.lock().await.remove(&chain_id);
		let Some(handle) = handle else {
			return Ok(());
		};

		handle.shutdown.send_replace(true);
		let result = handle.task.await;
		CHAINS_OBSERVED.set(self.active.lock().await.len() as f64);

		result.map_err(|e| {
			ObserverError::scheduler_error(
				"poller task failed",
				Some(Box::new(e)),
				Some(HashMap::from([("chain".to_string(), chain_id.to_string())])),
			)
		})
	}

	/// Signals every poller first, then joins them
	pub async fn stop_all(&self) {
		let handles: Vec<(u32, PollerHandle)> = self.active.lock().await.drain().collect();
		for (_, handle) in &handles {
			handle.shutdown.send_replace(true);
		}
		for (chain_id, handle) in handles {
			if let Err(e) = handle.task.await {
				error!("Poller task for chain {} failed during shutdown: {}", chain_id, e);
			}
		}
		CHAINS_OBSERVED.set(0.0);
		info!("All chain pollers stopped");
	}

	pub async fn active_chains(&self) -> Vec<u32> {
		let mut chains: Vec<u32> = self.active.lock().await.keys().copied().collect();
		chains.sort_unstable();
		chains
	}

	pub async fn poller_state(&self, chain_id: u32) -> Option<PollerState> {
		self.active
			.lock()
			.await
			.get(&chain_id)
			.map(|handle| *handle.state.borrow())
	}
}
