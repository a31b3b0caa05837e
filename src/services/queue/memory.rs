//! Process-local broker.
//!
//! Keeps ready and unacknowledged messages per queue. Dropping the connection
//! puts every unacknowledged message back at the head of its queue with its
//! redelivery count bumped, the same way a broker treats a lost consumer.

use async_trait::async_trait;
use std::{
	collections::{HashMap, VecDeque},
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
};
use tokio::sync::{Mutex, Notify};

use crate::services::queue::{
	queue_metadata, unknown_tag, Delivery, DurableQueue, QueueError, QueueName,
};

#[derive(Debug)]
struct Message {
	payload: Vec<u8>,
	redeliveries: u32,
}

#[derive(Debug, Default)]
struct QueueState {
	ready: VecDeque<Message>,
	unacked: HashMap<u64, Message>,
}

pub struct InMemoryQueue {
	queues: Mutex<HashMap<QueueName, QueueState>>,
	notifiers: HashMap<QueueName, Arc<Notify>>,
	next_tag: AtomicU64,
	connected: AtomicBool,
}

impl Default for InMemoryQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryQueue {
	pub fn new() -> Self {
		Self {
			queues: Mutex::new(HashMap::new()),
			notifiers: QueueName::ALL
				.into_iter()
				.map(|name| (name, Arc::new(Notify::new())))
				.collect(),
			next_tag: AtomicU64::new(1),
			connected: AtomicBool::new(true),
		}
	}

	/// Simulates losing or regaining the broker connection
	pub async fn set_connected(&self, connected: bool) {
		let was_connected = self.connected.swap(connected, Ordering::SeqCst);
		if was_connected && !connected {
			self.requeue_unacked().await;
		}
	}

	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}

	/// Messages waiting to be delivered
	pub async fn ready_count(&self, queue: QueueName) -> usize {
		self.queues
			.lock()
			.await
			.get(&queue)
			.map(|state| state.ready.len())
			.unwrap_or(0)
	}

	/// Messages delivered but not acknowledged yet
	pub async fn unacked_count(&self, queue: QueueName) -> usize {
		self.queues
			.lock()
			.await
			.get(&queue)
			.map(|state| state.unacked.len())
			.unwrap_or(0)
	}

	async fn requeue_unacked(&self) {
		let mut queues = self.queues.lock().await;
		for (name, state) in queues.iter_mut() {
			let mut tags: Vec<u64> = state.unacked.keys().copied().collect();
			tags.sort_unstable_by(|a, b| b.cmp(a));
			for tag in tags {
				if let Some(mut message) = state.unacked.remove(&tag) {
					message.redeliveries += 1;
					state.ready.push_front(message);
					self.notify(*name);
				}
			}
		}
	}

	fn notify(&self, queue: QueueName) {
		if let Some(notify) = self.notifiers.get(&queue) {
			notify.notify_one();
		}
	}

	fn ensure_connected(&self, queue: QueueName) -> Result<(), QueueError> {
		if self.is_connected() {
			Ok(())
		} else {
			Err(QueueError::connection_error(
				"broker connection is down",
				None,
				Some(queue_metadata(queue)),
			))
		}
	}
}

#[async_trait]
impl DurableQueue for InMemoryQueue {
	async fn declare(&self, queue: QueueName) -> Result<(), QueueError> {
		self.ensure_connected(queue)?;
		self.queues.lock().await.entry(queue).or_default();
		Ok(())
	}

	async fn publish(&self, queue: QueueName, payload: Vec<u8>) -> Result<(), QueueError> {
		self.ensure_connected(queue)?;
		let mut queues = self.queues.lock().await;
		let state = queues.get_mut(&queue).ok_or_else(|| {
			QueueError::publish_error("queue is not declared", None, Some(queue_metadata(queue)))
		})?;
		state.ready.push_back(Message {
			payload,
			redeliveries: 0,
		});
		self.notify(queue);
		Ok(())
	}

	async fn receive(&self, queue: QueueName) -> Result<Delivery, QueueError> {
		let notify = self
			.notifiers
			.get(&queue)
			.cloned()
			.ok_or_else(|| QueueError::consume_error("unknown queue", None, Some(queue_metadata(queue))))?;

		loop {
			self.ensure_connected(queue)?;
			{
				let mut queues = self.queues.lock().await;
				let state = queues.get_mut(&queue).ok_or_else(|| {
					QueueError::consume_error("queue is not declared", None, Some(queue_metadata(queue)))
				})?;
				if let Some(message) = state.ready.pop_front() {
					let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
					let delivery = Delivery {
						queue,
						tag,
						payload: message.payload.clone(),
						redeliveries: message.redeliveries,
					};
					state.unacked.insert(tag, message);
					return Ok(delivery);
				}
			}
			notify.notified().await;
		}
	}

	async fn ack(&self, queue: QueueName, tag: u64) -> Result<(), QueueError> {
		self.ensure_connected(queue)?;
		let mut queues = self.queues.lock().await;
		queues
			.get_mut(&queue)
			.and_then(|state| state.unacked.remove(&tag))
			.map(|_| ())
			.ok_or_else(|| unknown_tag(queue, tag))
	}

	async fn nack(&self, queue: QueueName, tag: u64, requeue: bool) -> Result<(), QueueError> {
		self.ensure_connected(queue)?;
		let mut queues = self.queues.lock().await;
		let state = queues.get_mut(&queue).ok_or_else(|| unknown_tag(queue, tag))?;
		let mut message = state.unacked.remove(&tag).ok_or_else(|| unknown_tag(queue, tag))?;
		if requeue {
			message.redeliveries += 1;
			state.ready.push_front(message);
			self.notify(queue);
		}
		Ok(())
	}

	async fn health_check(&self) -> Result<(), QueueError> {
		if self.is_connected() {
			Ok(())
		} else {
			Err(QueueError::connection_error("broker connection is down", None, None))
		}
	}

	async fn reconnect(&self) -> Result<(), QueueError> {
		self.connected.store(true, Ordering::SeqCst);
		for name in QueueName::ALL {
			self.notify(name);
		}
		Ok(())
	}
}
