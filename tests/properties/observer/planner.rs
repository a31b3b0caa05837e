use crate::properties::strategies::chain_strategy;
use chain_observer::services::observer::{BacklogPlanner, DEFAULT_BACKLOG_COUNT};
use proptest::{prelude::*, test_runner::Config};
use std::time::Duration;

fn planner(max_backlog_blocks: u64) -> BacklogPlanner {
	BacklogPlanner::new(
		Duration::from_millis(250),
		Duration::from_secs(3 * 60 * 60),
		max_backlog_blocks,
	)
}

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_plan_never_exceeds_tip_or_cap(
		chain in chain_strategy(),
		last in 0u64..1_000_000,
		current in 0u64..1_000_000,
		max in 1u64..2_000,
	) {
		let plan = planner(max).plan_range(Some(last), current, &chain);

		prop_assert_eq!(plan.from, last + 1);
		if last >= current {
			prop_assert!(plan.is_empty());
			prop_assert_eq!(plan.len(), 0);
		} else {
			prop_assert!(plan.to <= current);
			prop_assert_eq!(plan.len(), (current - last).min(max));
		}
	}

	#[test]
	fn test_successive_plans_cover_gap_without_overlap(
		chain in chain_strategy(),
		last in 0u64..100_000,
		gap in 0u64..10_000,
		max in 1u64..500,
	) {
		let planner = planner(max);
		let current = last + gap;
		let mut tracked = last;
		let mut covered = 0;

		loop {
			let plan = planner.plan_range(Some(tracked), current, &chain);
			if plan.is_empty() {
				break;
			}
			prop_assert_eq!(plan.from, tracked + 1);
			covered += plan.len();
			tracked = plan.to;
		}

		prop_assert_eq!(tracked, current);
		prop_assert_eq!(covered, gap);
	}

	#[test]
	fn test_first_plan_starts_one_backlog_behind(
		chain in chain_strategy(),
		current in 0u64..10_000_000,
	) {
		let planner = planner(u64::MAX);
		let plan = planner.plan_range(None, current, &chain);

		let backlog = match chain.block_time() {
			Some(block_time) => (planner.backlog_window.as_millis() / block_time.as_millis()) as u64,
			None => DEFAULT_BACKLOG_COUNT,
		};
		prop_assert_eq!(plan.from, current.saturating_sub(backlog));
		prop_assert_eq!(plan.to, current);
	}

	#[test]
	fn test_poll_interval_respects_floor(chain in chain_strategy()) {
		let planner = planner(100);
		let interval = planner.poll_interval(&chain);

		prop_assert!(interval >= planner.min_poll_interval);
		if let Some(block_time) = chain.block_time() {
			prop_assert!(interval >= block_time / 4);
		}
	}
}
