//! Domain models and data structures for the observation pipeline.
//!
//! - `config`: Configuration loading and validation
//! - `core`: Core domain models (Chain, Block, Tx, Subscription, NotificationEvent)

mod config;
mod core;

// Re-export core types
pub use core::{
	build_asset_id, prefixed_address, split_prefixed_address, subscription_key, AnyAction,
	AssetsByAddress, Block, Capability, Chain, CollectibleTransfer, ContractCall, Direction,
	NotificationDelivery, NotificationEvent, Subscription, SubscriptionEvent,
	SubscriptionOperation, SwapLeg, TokenAsset, TokenSwap, TokenTransfer, TokensRequest, Transfer,
	Tx, TxDecodeError, TxPayload, TxStatus, TxType,
};

// Re-export config types
pub use config::{ConfigError, ConfigLoader, ObserverConfig};
