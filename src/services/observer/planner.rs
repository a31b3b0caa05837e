//! Range planning for one polling cycle.

use std::time::Duration;

use crate::models::{Chain, ObserverConfig};

/// Backlog used when a chain does not declare its block time
pub const DEFAULT_BACKLOG_COUNT: u64 = 50;

/// Inclusive height range to fetch and the wait before the next cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklogPlan {
	pub from: u64,
	pub to: u64,
	pub poll_interval: Duration,
}

impl BacklogPlan {
	/// True when the chain has nothing new to offer
	pub fn is_empty(&self) -> bool {
		self.from > self.to
	}

	pub fn len(&self) -> u64 {
		if self.is_empty() {
			0
		} else {
			self.to - self.from + 1
		}
	}

	pub fn heights(&self) -> std::ops::RangeInclusive<u64> {
		self.from..=self.to
	}
}

/// Pacing rules shared by every chain poller
#[derive(Debug, Clone)]
pub struct BacklogPlanner {
	pub min_poll_interval: Duration,
	pub backlog_window: Duration,
	pub max_backlog_blocks: u64,
}

impl BacklogPlanner {
	pub fn new(
		min_poll_interval: Duration,
		backlog_window: Duration,
		max_backlog_blocks: u64,
	) -> Self {
		Self {
			min_poll_interval,
			backlog_window,
			max_backlog_blocks: max_backlog_blocks.max(1),
		}
	}

	pub fn from_config(config: &ObserverConfig) -> Self {
		Self::new(
			config.min_poll_interval(),
			config.backlog_window(),
			config.max_backlog_blocks,
		)
	}

	/// Polls four times per block, never faster than the configured floor
	pub fn poll_interval(&self, chain: &Chain) -> Duration {
		let quarter_block = chain.block_time().map(|t| t / 4).unwrap_or_default();
		self.min_poll_interval.max(quarter_block)
	}

	/// Number of blocks covered by the backlog window on first start
	pub fn backlog_count(&self, chain: &Chain) -> u64 {
		match chain.block_time() {
			Some(block_time) => {
				(self.backlog_window.as_millis() / block_time.as_millis()) as u64
			}
			None => {
				tracing::warn!(
					chain = chain.id,
					handle = %chain.handle,
					backlog = DEFAULT_BACKLOG_COUNT,
					"Unknown block time, using default backlog"
				);
				DEFAULT_BACKLOG_COUNT
			}
		}
	}

	/// Computes the next range from the tracked and current heights.
	///
	/// A chain seen for the first time starts `backlog_count` blocks behind the
	/// tip. Large gaps are drained `max_backlog_blocks` at a time.
	pub fn plan_range(
		&self,
		last_parsed: Option<u64>,
		current_height: u64,
		chain: &Chain,
	) -> BacklogPlan {
		let poll_interval = self.poll_interval(chain);
		let from = match last_parsed {
			Some(last) => last.saturating_add(1),
			None => current_height.saturating_sub(self.backlog_count(chain)),
		};

		let mut to = current_height;
		if from <= to && to - from >= self.max_backlog_blocks {
			to = from + self.max_backlog_blocks - 1;
		}

		BacklogPlan {
			from,
			to,
			poll_interval,
		}
	}
}
