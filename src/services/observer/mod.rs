//! Block observation: retrying fetches, range planning, height tracking,
//! batching and the per-chain polling loop.

mod batch;
mod error;
mod fetcher;
mod planner;
mod poller;
mod service;
mod tracker;

pub use batch::{convert_to_batch, TransactionsBatch};
pub use error::ObserverError;
pub use fetcher::fetch_with_retry;
pub use planner::{BacklogPlan, BacklogPlanner, DEFAULT_BACKLOG_COUNT};
pub use poller::{ChainPoller, CycleOutcome, PollerSettings, PollerState};
pub use service::ObserverService;
pub use tracker::BlockTracker;
