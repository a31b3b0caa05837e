use serde::{Deserialize, Serialize};

use crate::models::{Direction, Tx, TxType};

/// Body delivered to subscribers: `{"action": <tx type>, "result": <tx>}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationEvent {
	pub action: TxType,
	pub result: Tx,
}

impl NotificationEvent {
	pub fn from_tx(tx: Tx) -> Self {
		Self {
			action: tx.tx_type(),
			result: tx,
		}
	}

	/// Event for one subscriber, with `result.direction` set from its point of view
	pub fn for_subscriber(tx: &Tx, direction: Direction) -> Self {
		let mut tx = tx.clone();
		tx.direction = Some(direction);
		Self::from_tx(tx)
	}
}

/// Queue envelope addressing a notification to one subscriber.
///
/// The event is flattened, so the payload reads as a plain notification with an
/// extra `subscriber` field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationDelivery {
	pub subscriber: String,
	#[serde(flatten)]
	pub event: NotificationEvent,
}

impl NotificationDelivery {
	/// Identity used to drop redelivered duplicates
	pub fn dedupe_key(&self) -> String {
		format!("{}|{}|{}", self.subscriber, self.event.result.chain, self.event.result.id)
	}
}
