use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};
use tokio::sync::watch;

use crate::integration::mocks::MockDurableQueue;
use chain_observer::services::queue::{ConnectionSupervisor, QueueError};

const CHECK_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::test(start_paused = true)]
async fn test_recovers_after_single_failed_health_check() {
	let checks = Arc::new(AtomicUsize::new(0));
	let mut queue = MockDurableQueue::new();
	let counter = checks.clone();
	queue.expect_health_check().returning(move || {
		match counter.fetch_add(1, Ordering::SeqCst) {
			0 => Err(QueueError::connection_error("socket closed", None, None)),
			_ => Ok(()),
		}
	});
	queue.expect_reconnect().times(1).returning(|| Ok(()));

	let supervisor = ConnectionSupervisor::new(Arc::new(queue), CHECK_INTERVAL, 3);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let task = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

	tokio::time::sleep(CHECK_INTERVAL * 5).await;
	shutdown_tx.send(true).unwrap();

	task.await.unwrap().unwrap();
	assert!(checks.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_reconnects() {
	let mut queue = MockDurableQueue::new();
	queue
		.expect_health_check()
		.returning(|| Err(QueueError::connection_error("socket closed", None, None)));
	queue
		.expect_reconnect()
		.times(3)
		.returning(|| Err(QueueError::connection_error("connection refused", None, None)));

	let supervisor = ConnectionSupervisor::new(Arc::new(queue), CHECK_INTERVAL, 3);
	let (_shutdown_tx, shutdown_rx) = watch::channel(false);

	let error = supervisor.run(shutdown_rx).await.unwrap_err();
	assert!(matches!(error, QueueError::ConnectionError(_)));
}
