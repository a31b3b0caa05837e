//! HTTP bridge to out-of-process chain adapters.
//!
//! Adapters translate chain-specific APIs into canonical JSON and expose:
//! - `GET {endpoint}/height` returning `{"height": <u64>}`
//! - `GET {endpoint}/blocks/{height}` returning a canonical block
//! - `GET {endpoint}/tokens/{address}` returning a list of token assets
//! - `GET {endpoint}/xpub/{xpub}` returning the addresses derived from an extended key

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;

use crate::{
	models::{Block, Chain, TokenAsset, Tx},
	services::chain::{BlockSource, ChainSourceError, TokenSource, XpubSource},
};

#[derive(Deserialize)]
struct HeightResponse {
	height: u64,
}

/// Block as returned by the adapter; transactions are decoded one at a time
#[derive(Deserialize)]
struct RawBlock {
	number: u64,
	#[serde(default)]
	id: Option<String>,
	#[serde(default)]
	txs: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct HttpChainSource {
	chain: Chain,
	endpoint: String,
	client: ClientWithMiddleware,
}

impl HttpChainSource {
	pub fn new(chain: Chain, client: ClientWithMiddleware) -> Result<Self, ChainSourceError> {
		let endpoint = chain
			.endpoint
			.clone()
			.ok_or_else(|| {
				ChainSourceError::unsupported_capability(
					"chain has no adapter endpoint",
					None,
					Some(HashMap::from([("chain".to_string(), chain.id.to_string())])),
				)
			})?
			.trim_end_matches('/')
			.to_string();

		Ok(Self {
			chain,
			endpoint,
			client,
		})
	}

	fn metadata(&self, path: &str) -> Option<HashMap<String, String>> {
		Some(HashMap::from([
			("chain".to_string(), self.chain.id.to_string()),
			("path".to_string(), path.to_string()),
		]))
	}

	async fn fetch<T: DeserializeOwned>(
		&self,
		path: &str,
	) -> Result<Option<T>, ChainSourceError> {
		let url = format!("{}/{}", self.endpoint, path);
		let response = self.client.get(&url).send().await.map_err(|e| {
			ChainSourceError::request_error(
				"adapter request failed",
				Some(Box::new(e)),
				self.metadata(path),
			)
		})?;

		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ChainSourceError::request_error(
				format!("adapter responded with {}: {}", status, body),
				None,
				self.metadata(path),
			));
		}

		let bytes = response.bytes().await.map_err(|e| {
			ChainSourceError::request_error(
				"failed to read adapter response",
				Some(Box::new(e)),
				self.metadata(path),
			)
		})?;
		serde_json::from_slice(&bytes).map(Some).map_err(|e| {
			ChainSourceError::decode_error(
				"invalid adapter response",
				Some(Box::new(e)),
				self.metadata(path),
			)
		})
	}

	/// Keeps every transaction that decodes; the rest are logged and dropped.
	/// Transactions without a height get the block's number.
	fn decode_block(&self, raw: RawBlock) -> Block {
		let mut txs = Vec::with_capacity(raw.txs.len());
		for value in raw.txs {
			match serde_json::from_value::<Tx>(value) {
				Ok(mut tx) if tx.chain == self.chain.id => {
					if tx.block == 0 {
						tx.block = raw.number;
					}
					txs.push(tx);
				}
				Ok(tx) => tracing::warn!(
					chain = self.chain.id,
					block = raw.number,
					tx = %tx.id,
					tx_chain = tx.chain,
					"Skipping transaction reported for another chain"
				),
				Err(e) => tracing::warn!(
					chain = self.chain.id,
					block = raw.number,
					error = %e,
					"Skipping undecodable transaction"
				),
			}
		}

		Block {
			number: raw.number,
			id: raw.id,
			txs,
		}
	}
}

#[async_trait]
impl BlockSource for HttpChainSource {
	fn chain(&self) -> &Chain {
		&self.chain
	}

	async fn current_height(&self) -> Result<u64, ChainSourceError> {
		let response: HeightResponse = self.fetch("height").await?.ok_or_else(|| {
			ChainSourceError::request_error("height endpoint not found", None, self.metadata("height"))
		})?;
		Ok(response.height)
	}

	async fn block_by_height(&self, height: u64) -> Result<Block, ChainSourceError> {
		let path = format!("blocks/{}", height);
		let raw: RawBlock = self
			.fetch(&path)
			.await?
			.ok_or_else(|| ChainSourceError::block_not_found(height, None, self.metadata(&path)))?;
		Ok(self.decode_block(raw))
	}
}

#[async_trait]
impl TokenSource for HttpChainSource {
	fn chain(&self) -> &Chain {
		&self.chain
	}

	async fn tokens_by_address(&self, address: &str) -> Result<Vec<TokenAsset>, ChainSourceError> {
		let path = format!("tokens/{}", urlencoding::encode(address));
		Ok(self.fetch(&path).await?.unwrap_or_default())
	}
}

#[async_trait]
impl XpubSource for HttpChainSource {
	fn chain(&self) -> &Chain {
		&self.chain
	}

	async fn addresses_from_xpub(&self, xpub: &str) -> Result<Vec<String>, ChainSourceError> {
		let path = format!("xpub/{}", urlencoding::encode(xpub));
		let addresses: Vec<String> = self.fetch(&path).await?.unwrap_or_default();
		Ok(addresses
			.into_iter()
			.filter(|address| !address.is_empty())
			.collect())
	}
}
