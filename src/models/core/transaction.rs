//! Canonical transaction model.
//!
//! On the wire a transaction carries a `type` discriminator next to a `metadata`
//! object whose shape depends on that type. In memory the pair is a single
//! [`TxPayload`] enum, so a transaction can never hold two payloads or a payload
//! that disagrees with its type. Unknown discriminators and metadata that does not
//! fit the declared type both fail decoding.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Transaction discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
	Transfer,
	TokenTransfer,
	CollectibleTransfer,
	TokenSwap,
	ContractCall,
	AnyAction,
}

impl TxType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Transfer => "transfer",
			Self::TokenTransfer => "token_transfer",
			Self::CollectibleTransfer => "collectible_transfer",
			Self::TokenSwap => "token_swap",
			Self::ContractCall => "contract_call",
			Self::AnyAction => "any_action",
		}
	}
}

impl fmt::Display for TxType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
	#[default]
	Completed,
	Pending,
	Failed,
	Error,
}

/// Which way a transaction moves relative to the addresses a subscriber watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	Outgoing,
	Incoming,
	Yourself,
}

/// Native currency transfer
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Transfer {
	pub value: String,
	pub symbol: String,
	pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TokenTransfer {
	pub name: String,
	pub symbol: String,
	pub token_id: String,
	pub decimals: u32,
	pub value: String,
	pub from: String,
	pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct CollectibleTransfer {
	pub name: String,
	pub contract: String,
	#[serde(default)]
	pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SwapLeg {
	pub asset: String,
	pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TokenSwap {
	pub input: SwapLeg,
	pub output: SwapLeg,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ContractCall {
	pub input: String,
	pub value: String,
}

/// Chain-specific actions such as staking, delegation or token approvals
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct AnyAction {
	pub title: String,
	pub key: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub token_id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub symbol: String,
	#[serde(default)]
	pub decimals: u32,
	#[serde(default)]
	pub value: String,
}

/// Type-specific transaction data. Serializes as the bare metadata object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TxPayload {
	Transfer(Transfer),
	TokenTransfer(TokenTransfer),
	CollectibleTransfer(CollectibleTransfer),
	TokenSwap(TokenSwap),
	ContractCall(ContractCall),
	AnyAction(AnyAction),
}

impl TxPayload {
	pub fn tx_type(&self) -> TxType {
		match self {
			Self::Transfer(_) => TxType::Transfer,
			Self::TokenTransfer(_) => TxType::TokenTransfer,
			Self::CollectibleTransfer(_) => TxType::CollectibleTransfer,
			Self::TokenSwap(_) => TxType::TokenSwap,
			Self::ContractCall(_) => TxType::ContractCall,
			Self::AnyAction(_) => TxType::AnyAction,
		}
	}

	fn decode(tx_type: TxType, metadata: serde_json::Value) -> Result<Self, serde_json::Error> {
		Ok(match tx_type {
			TxType::Transfer => Self::Transfer(serde_json::from_value(metadata)?),
			TxType::TokenTransfer => Self::TokenTransfer(serde_json::from_value(metadata)?),
			TxType::CollectibleTransfer => {
				Self::CollectibleTransfer(serde_json::from_value(metadata)?)
			}
			TxType::TokenSwap => Self::TokenSwap(serde_json::from_value(metadata)?),
			TxType::ContractCall => Self::ContractCall(serde_json::from_value(metadata)?),
			TxType::AnyAction => Self::AnyAction(serde_json::from_value(metadata)?),
		})
	}
}

/// Raised when a transaction's metadata does not match its declared type
#[derive(Debug, thiserror::Error)]
#[error("invalid {tx_type} metadata for transaction {id}: {source}")]
pub struct TxDecodeError {
	pub id: String,
	pub tx_type: TxType,
	#[source]
	pub source: serde_json::Error,
}

/// Canonical transaction produced by chain adapters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTx")]
pub struct Tx {
	pub id: String,
	pub chain: u32,
	pub from: String,
	pub to: String,
	pub fee: String,
	/// Unix timestamp in seconds
	pub date: i64,
	/// Height of the containing block
	pub block: u64,
	pub status: TxStatus,
	pub sequence: u64,
	pub memo: String,
	pub payload: TxPayload,
	/// Set per subscriber on notifications, absent elsewhere
	pub direction: Option<Direction>,
}

impl Tx {
	pub fn tx_type(&self) -> TxType {
		self.payload.tx_type()
	}

	/// Unique, non-empty participant addresses
	pub fn addresses(&self) -> Vec<&str> {
		let mut addresses = Vec::with_capacity(2);
		for address in [self.from.as_str(), self.to.as_str()] {
			if !address.is_empty() && !addresses.contains(&address) {
				addresses.push(address);
			}
		}
		addresses
	}

	/// Direction as seen by a subscriber watching the addresses `watched` accepts.
	///
	/// A transaction between two watched addresses, or from an address to
	/// itself, is `Yourself`.
	pub fn direction_for(&self, watched: impl Fn(&str) -> bool) -> Direction {
		let from = !self.from.is_empty() && watched(&self.from);
		let to = !self.to.is_empty() && watched(&self.to);
		match (from, to) {
			(true, true) => Direction::Yourself,
			(true, false) if self.from == self.to => Direction::Yourself,
			(true, false) => Direction::Outgoing,
			_ => Direction::Incoming,
		}
	}
}

#[derive(Deserialize)]
struct RawTx {
	id: String,
	#[serde(alias = "coin")]
	chain: u32,
	#[serde(default)]
	from: String,
	#[serde(default)]
	to: String,
	#[serde(default)]
	fee: String,
	#[serde(default)]
	date: i64,
	#[serde(default)]
	block: u64,
	#[serde(default)]
	status: TxStatus,
	#[serde(default)]
	sequence: u64,
	#[serde(default)]
	memo: String,
	#[serde(rename = "type")]
	tx_type: TxType,
	metadata: serde_json::Value,
	#[serde(default)]
	direction: Option<Direction>,
}

impl TryFrom<RawTx> for Tx {
	type Error = TxDecodeError;

	fn try_from(raw: RawTx) -> Result<Self, Self::Error> {
		let payload =
			TxPayload::decode(raw.tx_type, raw.metadata).map_err(|source| TxDecodeError {
				id: raw.id.clone(),
				tx_type: raw.tx_type,
				source,
			})?;

		Ok(Self {
			id: raw.id,
			chain: raw.chain,
			from: raw.from,
			to: raw.to,
			fee: raw.fee,
			date: raw.date,
			block: raw.block,
			status: raw.status,
			sequence: raw.sequence,
			memo: raw.memo,
			payload,
			direction: raw.direction,
		})
	}
}

#[derive(Serialize)]
struct RawTxRef<'a> {
	id: &'a str,
	chain: u32,
	from: &'a str,
	to: &'a str,
	fee: &'a str,
	date: i64,
	block: u64,
	status: TxStatus,
	sequence: u64,
	#[serde(skip_serializing_if = "is_blank")]
	memo: &'a str,
	#[serde(rename = "type")]
	tx_type: TxType,
	metadata: &'a TxPayload,
	#[serde(skip_serializing_if = "Option::is_none")]
	direction: Option<Direction>,
}

fn is_blank(value: &&str) -> bool {
	value.is_empty()
}

impl Serialize for Tx {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		RawTxRef {
			id: &self.id,
			chain: self.chain,
			from: &self.from,
			to: &self.to,
			fee: &self.fee,
			date: self.date,
			block: self.block,
			status: self.status,
			sequence: self.sequence,
			memo: &self.memo,
			tx_type: self.tx_type(),
			metadata: &self.payload,
			direction: self.direction,
		}
		.serialize(serializer)
	}
}
