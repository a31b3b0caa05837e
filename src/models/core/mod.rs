//! Core domain models for the observation pipeline.
//!
//! - Chains: immutable reference data with declared capabilities
//! - Blocks and transactions in their canonical, chain-agnostic shape
//! - Subscriptions and the events that mutate them
//! - Notification and asset records exchanged over the queue

mod asset;
mod block;
mod chain;
mod notification;
mod subscription;
mod transaction;

pub use asset::{
	build_asset_id, prefixed_address, split_prefixed_address, AssetsByAddress, TokenAsset,
	TokensRequest,
};
pub use block::Block;
pub use chain::{Capability, Chain};
pub use notification::{NotificationDelivery, NotificationEvent};
pub use subscription::{subscription_key, Subscription, SubscriptionEvent, SubscriptionOperation};
pub use transaction::{
	AnyAction, CollectibleTransfer, ContractCall, Direction, SwapLeg, TokenSwap, TokenTransfer,
	Transfer, Tx, TxDecodeError, TxPayload, TxStatus, TxType,
};
