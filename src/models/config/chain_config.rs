//! Chain configuration loading and validation.

use std::{
	collections::{HashMap, HashSet},
	path::Path,
};

use crate::models::{config::error::ConfigError, Chain, ConfigLoader};

const DEFAULT_CHAINS_DIR: &str = "config/chains";

impl ConfigLoader for Chain {
	fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let chain_dir = path.unwrap_or(Path::new(DEFAULT_CHAINS_DIR));

		if !chain_dir.exists() {
			return Err(ConfigError::file_error(
				"chains directory not found",
				None,
				Some(HashMap::from([(
					"path".to_string(),
					chain_dir.display().to_string(),
				)])),
			));
		}

		let mut paths = Vec::new();
		for entry in std::fs::read_dir(chain_dir)? {
			let path = entry?.path();
			if Self::is_json_file(&path) {
				paths.push(path);
			}
		}
		paths.sort();

		let mut seen_ids = HashSet::new();
		let mut pairs = Vec::with_capacity(paths.len());
		for path in paths {
			let chain = Self::load_from_path(&path)?;
			if !seen_ids.insert(chain.id) {
				return Err(ConfigError::validation_error(
					format!("duplicate chain id {}", chain.id),
					None,
					Some(HashMap::from([(
						"path".to_string(),
						path.display().to_string(),
					)])),
				));
			}
			pairs.push((chain.handle.clone(), chain));
		}

		Ok(T::from_iter(pairs))
	}

	fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let file = std::fs::File::open(path)?;
		let config: Chain = serde_json::from_reader(file)?;

		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let metadata = || Some(HashMap::from([("chain".to_string(), self.id.to_string())]));

		if self.handle.is_empty()
			|| !self
				.handle
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
		{
			return Err(ConfigError::validation_error(
				"Handle must contain only lowercase letters, numbers, and underscores",
				None,
				metadata(),
			));
		}

		if self.symbol.is_empty() {
			return Err(ConfigError::validation_error(
				"Symbol must not be empty",
				None,
				metadata(),
			));
		}

		match &self.endpoint {
			Some(endpoint) => {
				if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
					return Err(ConfigError::validation_error(
						"Endpoint must start with http:// or https://",
						None,
						metadata(),
					));
				}
			}
			None if !self.capabilities.is_empty() => {
				return Err(ConfigError::validation_error(
					"Capabilities require an endpoint",
					None,
					metadata(),
				));
			}
			None => {}
		}

		Ok(())
	}
}
