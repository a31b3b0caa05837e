//! Subscription index error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum SubscriptionError {
	/// The backing store rejected a read or a write
	#[error("Storage error: {0}")]
	StorageError(ErrorContext),

	/// An extended public key could not be registered
	#[error("Xpub error: {0}")]
	XpubError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl SubscriptionError {
	pub fn storage_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StorageError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn xpub_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::XpubError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for SubscriptionError {
	fn trace_id(&self) -> String {
		match self {
			Self::StorageError(ctx) => ctx.trace_id.clone(),
			Self::XpubError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
