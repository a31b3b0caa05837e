//! Registry of observed chains and the capabilities each one provides.
//!
//! A chain is registered once at startup together with whichever sources its
//! adapter implements. Consumers ask the registry for the capability they need
//! instead of probing adapters at runtime.

use reqwest_middleware::ClientWithMiddleware;
use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use crate::{
	models::{Capability, Chain},
	services::chain::{BlockSource, ChainSourceError, HttpChainSource, TokenSource, XpubSource},
};

/// A chain together with the sources serving its capabilities
#[derive(Clone)]
pub struct ChainDescriptor {
	pub chain: Chain,
	capabilities: BTreeSet<Capability>,
	block_source: Option<Arc<dyn BlockSource>>,
	token_source: Option<Arc<dyn TokenSource>>,
	xpub_source: Option<Arc<dyn XpubSource>>,
}

impl ChainDescriptor {
	pub fn new(chain: Chain) -> Self {
		Self {
			chain,
			capabilities: BTreeSet::new(),
			block_source: None,
			token_source: None,
			xpub_source: None,
		}
	}

	pub fn with_block_source(mut self, source: Arc<dyn BlockSource>) -> Self {
		self.capabilities.insert(Capability::Blocks);
		self.block_source = Some(source);
		self
	}

	pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
		self.capabilities.insert(Capability::Tokens);
		self.token_source = Some(source);
		self
	}

	pub fn with_xpub_source(mut self, source: Arc<dyn XpubSource>) -> Self {
		self.capabilities.insert(Capability::Xpub);
		self.xpub_source = Some(source);
		self
	}

	pub fn supports(&self, capability: Capability) -> bool {
		self.capabilities.contains(&capability)
	}

	pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
		self.capabilities.iter().copied()
	}

	pub fn block_source(&self) -> Option<Arc<dyn BlockSource>> {
		self.block_source.clone()
	}

	pub fn token_source(&self) -> Option<Arc<dyn TokenSource>> {
		self.token_source.clone()
	}

	pub fn xpub_source(&self) -> Option<Arc<dyn XpubSource>> {
		self.xpub_source.clone()
	}
}

/// Chains keyed by numeric id
#[derive(Clone, Default)]
pub struct ChainRegistry {
	chains: BTreeMap<u32, ChainDescriptor>,
}

impl ChainRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds HTTP-backed descriptors for every chain that declares capabilities.
	///
	/// Chains without an endpoint are registered with no capabilities so that they
	/// still resolve by id.
	pub fn from_chains(
		chains: impl IntoIterator<Item = Chain>,
		client: ClientWithMiddleware,
	) -> Result<Self, ChainSourceError> {
		let mut registry = Self::new();
		for chain in chains {
			let mut descriptor = ChainDescriptor::new(chain.clone());
			if chain.endpoint.is_some() && !chain.capabilities.is_empty() {
				let source = Arc::new(HttpChainSource::new(chain.clone(), client.clone())?);
				if chain.declares(Capability::Blocks) {
					descriptor = descriptor.with_block_source(source.clone());
				}
				if chain.declares(Capability::Tokens) {
					descriptor = descriptor.with_token_source(source.clone());
				}
				if chain.declares(Capability::Xpub) {
					descriptor = descriptor.with_xpub_source(source);
				}
			}
			registry.register(descriptor);
		}
		Ok(registry)
	}

	/// Adds or replaces a chain
	pub fn register(&mut self, descriptor: ChainDescriptor) {
		tracing::debug!(
			chain = descriptor.chain.id,
			handle = %descriptor.chain.handle,
			capabilities = ?descriptor.capabilities,
			"Registered chain"
		);
		self.chains.insert(descriptor.chain.id, descriptor);
	}

	pub fn get(&self, chain_id: u32) -> Option<&ChainDescriptor> {
		self.chains.get(&chain_id)
	}

	pub fn supports(&self, chain_id: u32, capability: Capability) -> bool {
		self.get(chain_id)
			.map(|descriptor| descriptor.supports(capability))
			.unwrap_or(false)
	}

	/// Every block source, in chain id order
	pub fn block_sources(&self) -> Vec<Arc<dyn BlockSource>> {
		self.chains
			.values()
			.filter_map(ChainDescriptor::block_source)
			.collect()
	}

	pub fn block_source(&self, chain_id: u32) -> Option<Arc<dyn BlockSource>> {
		self.get(chain_id).and_then(ChainDescriptor::block_source)
	}

	pub fn token_source(&self, chain_id: u32) -> Option<Arc<dyn TokenSource>> {
		self.get(chain_id).and_then(ChainDescriptor::token_source)
	}

	pub fn xpub_source(&self, chain_id: u32) -> Option<Arc<dyn XpubSource>> {
		self.get(chain_id).and_then(ChainDescriptor::xpub_source)
	}

	pub fn chains(&self) -> impl Iterator<Item = &Chain> {
		self.chains.values().map(|descriptor| &descriptor.chain)
	}

	pub fn len(&self) -> usize {
		self.chains.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}
}
