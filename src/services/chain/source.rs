//! Capability traits implemented by chain adapters.

use async_trait::async_trait;

use crate::{
	models::{Block, Chain, TokenAsset},
	services::chain::ChainSourceError,
};

/// Height and block access for one chain
#[async_trait]
pub trait BlockSource: Send + Sync {
	fn chain(&self) -> &Chain;

	async fn current_height(&self) -> Result<u64, ChainSourceError>;

	async fn block_by_height(&self, height: u64) -> Result<Block, ChainSourceError>;
}

/// Token holdings lookup for one chain
#[async_trait]
pub trait TokenSource: Send + Sync {
	fn chain(&self) -> &Chain;

	async fn tokens_by_address(&self, address: &str) -> Result<Vec<TokenAsset>, ChainSourceError>;
}

/// Derives the addresses behind an extended public key on one chain
#[async_trait]
pub trait XpubSource: Send + Sync {
	fn chain(&self) -> &Chain;

	async fn addresses_from_xpub(&self, xpub: &str) -> Result<Vec<String>, ChainSourceError>;
}
