//! Redis streams broker.
//!
//! Every queue is a stream read through one consumer group. A delivered entry
//! stays in the group's pending list until it is acked, so entries this
//! consumer held when it crashed or lost its connection are read back first
//! after declaring or reconnecting. Messages given up on are moved to a
//! `<queue>-dlq` stream.

use async_trait::async_trait;
use redis::{
	aio::MultiplexedConnection,
	streams::{StreamId, StreamReadOptions, StreamReadReply},
	AsyncCommands, Client, Cmd, RedisError,
};
use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::{Mutex, RwLock};

use crate::services::queue::{
	queue_metadata, unknown_tag, Delivery, DurableQueue, QueueError, QueueName,
};

const PAYLOAD_FIELD: &str = "payload";
const REDELIVERIES_FIELD: &str = "redeliveries";

/// Where the next read of a queue starts
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadCursor {
	/// Replaying this consumer's pending entries after the given id
	Pending(String),
	/// Reading entries never delivered to the group
	New,
}

impl ReadCursor {
	fn id(&self) -> &str {
		match self {
			ReadCursor::Pending(id) => id,
			ReadCursor::New => ">",
		}
	}
}

/// A delivered entry awaiting ack or nack
#[derive(Debug, Clone)]
struct InFlight {
	queue: QueueName,
	id: String,
	payload: Vec<u8>,
	redeliveries: u32,
}

pub struct RedisQueue {
	client: Client,
	commands: RwLock<MultiplexedConnection>,
	/// Blocking reads get a connection of their own per queue
	readers: Mutex<HashMap<QueueName, MultiplexedConnection>>,
	cursors: Mutex<HashMap<QueueName, ReadCursor>>,
	in_flight: Mutex<HashMap<u64, InFlight>>,
	next_tag: AtomicU64,
	group: String,
	consumer: String,
	block_ms: usize,
}

impl RedisQueue {
	/// Opens the command connection. `consumer` should be stable across
	/// restarts so pending entries are picked up again.
	pub async fn connect(
		url: &str,
		group: impl Into<String>,
		consumer: impl Into<String>,
		block_ms: usize,
	) -> Result<Self, QueueError> {
		let client = Client::open(url).map_err(|e| {
			QueueError::connection_error(
				"invalid redis url",
				Some(Box::new(e)),
				Some(HashMap::from([("url".to_string(), url.to_string())])),
			)
		})?;
		let commands = client
			.get_multiplexed_async_connection()
			.await
			.map_err(|e| connection_lost("failed to connect to redis", e))?;

		Ok(Self {
			client,
			commands: RwLock::new(commands),
			readers: Mutex::new(HashMap::new()),
			cursors: Mutex::new(HashMap::new()),
			in_flight: Mutex::new(HashMap::new()),
			next_tag: AtomicU64::new(1),
			group: group.into(),
			consumer: consumer.into(),
			block_ms: block_ms.max(1),
		})
	}

	async fn commands(&self) -> MultiplexedConnection {
		self.commands.read().await.clone()
	}

	async fn reader(&self, queue: QueueName) -> Result<MultiplexedConnection, QueueError> {
		let mut readers = self.readers.lock().await;
		if let Some(conn) = readers.get(&queue) {
			return Ok(conn.clone());
		}
		let conn = self
			.client
			.get_multiplexed_async_connection()
			.await
			.map_err(|e| connection_lost("failed to open reader connection", e))?;
		readers.insert(queue, conn.clone());
		Ok(conn)
	}

	async fn replay_pending(&self, queues: &[QueueName]) {
		let mut cursors = self.cursors.lock().await;
		for queue in queues {
			cursors.insert(*queue, ReadCursor::Pending("0".to_string()));
		}
	}

	async fn cursor(&self, queue: QueueName) -> ReadCursor {
		self.cursors
			.lock()
			.await
			.get(&queue)
			.cloned()
			.unwrap_or(ReadCursor::New)
	}

	async fn advance(&self, queue: QueueName, cursor: ReadCursor) {
		self.cursors.lock().await.insert(queue, cursor);
	}

	/// Acks and deletes `settled`, optionally re-adding its payload first, in
	/// one transaction
	async fn settle(
		&self,
		settled: &InFlight,
		readd: Option<(String, u32)>,
	) -> Result<(), QueueError> {
		let stream = settled.queue.as_str();
		let mut pipe = redis::pipe();
		pipe.atomic();
		if let Some((target, redeliveries)) = readd {
			pipe.add_command(append_cmd(&target, &settled.payload, redeliveries))
				.ignore();
		}
		pipe.cmd("XACK")
			.arg(stream)
			.arg(&self.group)
			.arg(&settled.id)
			.ignore()
			.cmd("XDEL")
			.arg(stream)
			.arg(&settled.id)
			.ignore();

		let mut conn = self.commands().await;
		let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
			QueueError::consume_error(
				"failed to settle stream entry",
				Some(Box::new(e)),
				Some(entry_metadata(settled.queue, &settled.id)),
			)
		})?;
		Ok(())
	}

	async fn take_in_flight(&self, queue: QueueName, tag: u64) -> Result<InFlight, QueueError> {
		let mut in_flight = self.in_flight.lock().await;
		match in_flight.get(&tag) {
			Some(entry) if entry.queue == queue => {}
			_ => return Err(unknown_tag(queue, tag)),
		}
		in_flight.remove(&tag).ok_or_else(|| unknown_tag(queue, tag))
	}
}

#[async_trait]
impl DurableQueue for RedisQueue {
	async fn declare(&self, queue: QueueName) -> Result<(), QueueError> {
		let mut conn = self.commands().await;
		let created: redis::RedisResult<()> = conn
			.xgroup_create_mkstream(queue.as_str(), self.group.as_str(), "0")
			.await;
		if let Err(e) = created {
			if e.code() != Some("BUSYGROUP") {
				return Err(QueueError::connection_error(
					"failed to create consumer group",
					Some(Box::new(e)),
					Some(queue_metadata(queue)),
				));
			}
			tracing::debug!(queue = %queue, group = %self.group, "Consumer group already exists");
		}
		self.replay_pending(&[queue]).await;
		Ok(())
	}

	async fn publish(&self, queue: QueueName, payload: Vec<u8>) -> Result<(), QueueError> {
		let mut conn = self.commands().await;
		let _: String = append_cmd(queue.as_str(), &payload, 0)
			.query_async(&mut conn)
			.await
			.map_err(|e| {
				QueueError::publish_error(
					"failed to append to stream",
					Some(Box::new(e)),
					Some(queue_metadata(queue)),
				)
			})?;
		Ok(())
	}

	async fn receive(&self, queue: QueueName) -> Result<Delivery, QueueError> {
		loop {
			let cursor = self.cursor(queue).await;
			let options = StreamReadOptions::default()
				.group(self.group.as_str(), self.consumer.as_str())
				.count(1);
			let options = match cursor {
				ReadCursor::New => options.block(self.block_ms),
				ReadCursor::Pending(_) => options,
			};

			let mut conn = self.reader(queue).await?;
			let reply: Result<StreamReadReply, RedisError> = conn
				.xread_options(&[queue.as_str()], &[cursor.id()], &options)
				.await;
			let reply = match reply {
				Ok(reply) => reply,
				Err(e) => {
					self.readers.lock().await.remove(&queue);
					return Err(QueueError::consume_error(
						"failed to read from stream",
						Some(Box::new(e)),
						Some(queue_metadata(queue)),
					));
				}
			};

			let Some(entry) = reply.keys.into_iter().flat_map(|key| key.ids).next() else {
				if matches!(cursor, ReadCursor::Pending(_)) {
					tracing::debug!(queue = %queue, "Pending entries replayed");
					self.advance(queue, ReadCursor::New).await;
				}
				continue;
			};

			let replayed = matches!(cursor, ReadCursor::Pending(_));
			if replayed {
				self.advance(queue, ReadCursor::Pending(entry.id.clone())).await;
			}

			let Some((payload, redeliveries)) = entry_message(&entry, replayed) else {
				// Pending entries whose data was already deleted come back empty
				tracing::warn!(queue = %queue, id = %entry.id, "Dropping stream entry without payload");
				let empty = InFlight {
					queue,
					id: entry.id,
					payload: Vec::new(),
					redeliveries: 0,
				};
				self.settle(&empty, None).await?;
				continue;
			};

			let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
			self.in_flight.lock().await.insert(
				tag,
				InFlight {
					queue,
					id: entry.id,
					payload: payload.clone(),
					redeliveries,
				},
			);
			return Ok(Delivery {
				queue,
				tag,
				payload,
				redeliveries,
			});
		}
	}

	async fn ack(&self, queue: QueueName, tag: u64) -> Result<(), QueueError> {
		let entry = self.take_in_flight(queue, tag).await?;
		self.settle(&entry, None).await
	}

	async fn nack(&self, queue: QueueName, tag: u64, requeue: bool) -> Result<(), QueueError> {
		let entry = self.take_in_flight(queue, tag).await?;
		if requeue {
			let target = queue.as_str().to_string();
			self.settle(&entry, Some((target, entry.redeliveries + 1)))
				.await
		} else {
			tracing::warn!(
				queue = %queue,
				id = %entry.id,
				redeliveries = entry.redeliveries,
				"Moving message to dead-letter stream"
			);
			self.settle(&entry, Some((dead_letter_stream(queue), entry.redeliveries)))
				.await
		}
	}

	async fn health_check(&self) -> Result<(), QueueError> {
		let mut conn = self.commands().await;
		let _: String = redis::cmd("PING")
			.query_async(&mut conn)
			.await
			.map_err(|e| connection_lost("redis ping failed", e))?;
		Ok(())
	}

	async fn reconnect(&self) -> Result<(), QueueError> {
		let conn = self
			.client
			.get_multiplexed_async_connection()
			.await
			.map_err(|e| connection_lost("failed to reconnect to redis", e))?;
		*self.commands.write().await = conn;
		self.readers.lock().await.clear();
		self.replay_pending(&QueueName::ALL).await;
		Ok(())
	}
}

/// Stream holding the messages of `queue` that were given up on
pub fn dead_letter_stream(queue: QueueName) -> String {
	format!("{}-dlq", queue)
}

fn append_cmd(stream: &str, payload: &[u8], redeliveries: u32) -> Cmd {
	let mut cmd = redis::cmd("XADD");
	cmd.arg(stream)
		.arg("*")
		.arg(PAYLOAD_FIELD)
		.arg(payload)
		.arg(REDELIVERIES_FIELD)
		.arg(redeliveries);
	cmd
}

/// Payload and redelivery count of an entry. A replayed entry was handed out
/// at least once more than its stored count says.
fn entry_message(entry: &StreamId, replayed: bool) -> Option<(Vec<u8>, u32)> {
	let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD)?;
	let stored = entry.get::<u32>(REDELIVERIES_FIELD).unwrap_or(0);
	Some((payload, if replayed { stored + 1 } else { stored }))
}

fn entry_metadata(queue: QueueName, id: &str) -> HashMap<String, String> {
	let mut metadata = queue_metadata(queue);
	metadata.insert("id".to_string(), id.to_string());
	metadata
}

fn connection_lost(msg: &str, e: RedisError) -> QueueError {
	QueueError::connection_error(msg, Some(Box::new(e)), None)
}
