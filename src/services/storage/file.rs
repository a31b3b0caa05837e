//! File-backed key/value store.
//!
//! Layout: `{root}/{namespace}/{url-encoded key}.json`. Writes go to a temporary
//! sibling file that is synced and renamed over the target, then the directory
//! is synced, so after a crash readers see either the old or the new document.

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::KeyValueStore;

const RECORD_EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct FileStore {
	root: PathBuf,
}

impl FileStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn namespace_dir(&self, namespace: &str) -> anyhow::Result<PathBuf> {
		if namespace.is_empty()
			|| !namespace
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
		{
			anyhow::bail!("invalid storage namespace {:?}", namespace);
		}
		Ok(self.root.join(namespace))
	}

	fn record_path(&self, namespace: &str, key: &str) -> anyhow::Result<PathBuf> {
		if key.is_empty() {
			anyhow::bail!("empty storage key");
		}
		let file_name = format!("{}.{}", urlencoding::encode(key), RECORD_EXTENSION);
		Ok(self.namespace_dir(namespace)?.join(file_name))
	}
}

impl Default for FileStore {
	fn default() -> Self {
		Self::new("data")
	}
}

#[async_trait]
impl KeyValueStore for FileStore {
	async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
		let path = self.record_path(namespace, key)?;

		let content = match tokio::fs::read(&path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				return Err(e).with_context(|| format!("Failed to read {}", path.display()))
			}
		};

		let value = serde_json::from_slice(&content)
			.with_context(|| format!("Corrupt record {}", path.display()))?;
		Ok(Some(value))
	}

	async fn set(
		&self,
		namespace: &str,
		key: &str,
		value: serde_json::Value,
	) -> anyhow::Result<()> {
		let path = self.record_path(namespace, key)?;
		let dir = self.namespace_dir(namespace)?;
		tokio::fs::create_dir_all(&dir)
			.await
			.with_context(|| format!("Failed to create {}", dir.display()))?;

		let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
		let bytes = serde_json::to_vec(&value)?;
		if let Err(e) = write_synced(&tmp_path, &bytes).await {
			let _ = tokio::fs::remove_file(&tmp_path).await;
			return Err(e).with_context(|| format!("Failed to write {}", tmp_path.display()));
		}

		if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
			let _ = tokio::fs::remove_file(&tmp_path).await;
			return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
		}
		sync_dir(&dir)
			.await
			.with_context(|| format!("Failed to sync {}", dir.display()))
	}

	async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()> {
		let path = self.record_path(namespace, key)?;
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
		}
	}

	async fn keys(&self, namespace: &str) -> anyhow::Result<Vec<String>> {
		let dir = self.namespace_dir(namespace)?;
		let mut entries = match tokio::fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let file_name = entry.file_name();
			let Some(name) = file_name.to_str() else {
				continue;
			};
			let Some(encoded) = name.strip_suffix(".json") else {
				continue;
			};
			keys.push(urlencoding::decode(encoded)?.into_owned());
		}
		keys.sort();
		Ok(keys)
	}
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
	let mut file = tokio::fs::File::create(path).await?;
	file.write_all(bytes).await?;
	file.sync_all().await
}

/// Makes a rename inside `dir` durable
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
	tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
	Ok(())
}
