//! Chain source error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Errors raised while talking to a chain adapter
#[derive(ThisError, Debug)]
pub enum ChainSourceError {
	/// Transport failures and non-success responses
	#[error("Request error: {0}")]
	RequestError(ErrorContext),

	/// The adapter answered with a payload that could not be decoded
	#[error("Decode error: {0}")]
	DecodeError(ErrorContext),

	/// The requested block does not exist (yet)
	#[error("Block not found: {0}")]
	BlockNotFound(ErrorContext),

	/// The chain does not provide the requested capability
	#[error("Unsupported capability: {0}")]
	UnsupportedCapability(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ChainSourceError {
	pub fn request_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RequestError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn decode_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DecodeError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn block_not_found(
		height: u64,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::BlockNotFound(ErrorContext::new_with_log(
			format!("block {}", height),
			source,
			metadata,
		))
	}

	pub fn unsupported_capability(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::UnsupportedCapability(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for ChainSourceError {
	fn trace_id(&self) -> String {
		match self {
			Self::RequestError(ctx) => ctx.trace_id.clone(),
			Self::DecodeError(ctx) => ctx.trace_id.clone(),
			Self::BlockNotFound(ctx) => ctx.trace_id.clone(),
			Self::UnsupportedCapability(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
