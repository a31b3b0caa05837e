//! Repository layer for configuration-backed reference data.
//!
//! Chains are immutable at runtime, so the repository is loaded once at
//! startup and served from memory.

mod chain;
mod error;

pub use chain::{ChainRepository, ChainRepositoryTrait, ChainService};
pub use error::RepositoryError;
