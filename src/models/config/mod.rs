//! Configuration loading.
//!
//! Chains are read from one JSON file per chain (`config/chains/*.json`);
//! observer tuning lives in a single optional `config/observer.json`.

use std::path::Path;

mod chain_config;
mod error;
mod observer_config;

pub use error::ConfigError;
pub use observer_config::ObserverConfig;

/// Common interface for loading configuration files
pub trait ConfigLoader: Sized {
	/// Loads every configuration file in a directory
	fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>;

	/// Loads and validates a single configuration file
	fn load_from_path(path: &Path) -> Result<Self, ConfigError>;

	fn validate(&self) -> Result<(), ConfigError>;

	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}
}
