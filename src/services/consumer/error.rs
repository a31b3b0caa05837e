//! Consumer error types.
//!
//! The variant decides what happens to the message: an invalid message is
//! acknowledged and dropped, a processing error is requeued.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum ConsumerError {
	/// The payload can never be processed (malformed, unknown target)
	#[error("Invalid message: {0}")]
	InvalidMessage(ErrorContext),

	/// A side effect failed; the message should be retried
	#[error("Processing error: {0}")]
	ProcessingError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ConsumerError {
	pub fn invalid_message(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::InvalidMessage(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn processing_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ProcessingError(ErrorContext::new_with_log(msg, source, metadata))
	}

	/// Only invalid messages are dropped without retry
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::InvalidMessage(_))
	}
}

impl TraceableError for ConsumerError {
	fn trace_id(&self) -> String {
		match self {
			Self::InvalidMessage(ctx) => ctx.trace_id.clone(),
			Self::ProcessingError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
