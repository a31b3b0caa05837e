//! Chain configuration repository implementation.
//!
//! Loads chain descriptors from JSON files and serves them by handle or id.

use std::{collections::HashMap, path::Path};

use crate::{
	models::{Chain, ConfigLoader},
	repositories::error::RepositoryError,
};

/// Repository of chain descriptors keyed by handle
#[derive(Clone, Default)]
pub struct ChainRepository {
	pub chains: HashMap<String, Chain>,
}

impl ChainRepository {
	/// Loads every chain under `path` (default `config/chains`)
	pub fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		let chains = Self::load_all(path)?;
		Ok(ChainRepository { chains })
	}

	/// Builds a repository from already constructed chains
	pub fn from_chains(chains: impl IntoIterator<Item = Chain>) -> Self {
		Self {
			chains: chains
				.into_iter()
				.map(|chain| (chain.handle.clone(), chain))
				.collect(),
		}
	}

	fn load_all(path: Option<&Path>) -> Result<HashMap<String, Chain>, RepositoryError> {
		Chain::load_all(path).map_err(|e| {
			RepositoryError::load_error("Failed to load chains", Some(Box::new(e)), None)
		})
	}
}

/// Interface for chain repository implementations
pub trait ChainRepositoryTrait: Clone {
	fn get(&self, handle: &str) -> Option<Chain>;
	fn get_by_id(&self, id: u32) -> Option<Chain>;
	fn get_all(&self) -> HashMap<String, Chain>;
}

impl ChainRepositoryTrait for ChainRepository {
	fn get(&self, handle: &str) -> Option<Chain> {
		self.chains.get(handle).cloned()
	}

	fn get_by_id(&self, id: u32) -> Option<Chain> {
		self.chains.values().find(|chain| chain.id == id).cloned()
	}

	fn get_all(&self) -> HashMap<String, Chain> {
		self.chains.clone()
	}
}

/// Service layer for chain repository operations
#[derive(Clone)]
pub struct ChainService<T: ChainRepositoryTrait> {
	repository: T,
}

impl<T: ChainRepositoryTrait> ChainService<T> {
	pub fn new_with_repository(repository: T) -> Self {
		Self { repository }
	}

	pub fn get(&self, handle: &str) -> Option<Chain> {
		self.repository.get(handle)
	}

	pub fn get_by_id(&self, id: u32) -> Option<Chain> {
		self.repository.get_by_id(id)
	}

	pub fn get_all(&self) -> HashMap<String, Chain> {
		self.repository.get_all()
	}
}

impl ChainService<ChainRepository> {
	pub fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		Ok(Self {
			repository: ChainRepository::new(path)?,
		})
	}
}
