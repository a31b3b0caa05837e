use chain_observer::utils::{RetryConfig, WithRetry};
use proptest::{prelude::*, test_runner::Config};
use std::{
	sync::atomic::{AtomicU32, Ordering},
	time::Duration,
};

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_delay_is_capped(
		base_ms in 0u64..5_000,
		cap_factor in 1u32..8,
		failed_attempt in 1u32..64,
	) {
		let base = Duration::from_millis(base_ms);
		let config = RetryConfig {
			max_interval: base * cap_factor,
			..RetryConfig::new(10, base)
		};

		let delay = config.delay_for(failed_attempt);
		prop_assert!(delay >= base.min(config.max_interval));
		prop_assert!(delay <= config.max_interval + base / 2);
	}

	#[test]
	fn test_attempts_are_bounded(
		max_attempts in 1u32..6,
		succeed_on in 1u32..10,
	) {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_time()
			.start_paused(true)
			.build()
			.unwrap();
		let calls = AtomicU32::new(0);

		let result: Result<u32, String> = runtime.block_on(
			WithRetry::new(RetryConfig::new(max_attempts, Duration::from_millis(10))).attempt(|| {
				let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
				async move {
					if call >= succeed_on {
						Ok(call)
					} else {
						Err(format!("attempt {} failed", call))
					}
				}
			}),
		);

		if succeed_on <= max_attempts {
			prop_assert_eq!(result, Ok(succeed_on));
			prop_assert_eq!(calls.load(Ordering::SeqCst), succeed_on);
		} else {
			prop_assert!(result.is_err());
			prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
		}
	}
}
