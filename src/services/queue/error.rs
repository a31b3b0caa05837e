//! Queue error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum QueueError {
	/// The broker connection is down or could not be re-established
	#[error("Connection error: {0}")]
	ConnectionError(ErrorContext),

	/// The broker did not accept a message
	#[error("Publish error: {0}")]
	PublishError(ErrorContext),

	/// Receiving or acknowledging failed
	#[error("Consume error: {0}")]
	ConsumeError(ErrorContext),

	/// A payload could not be encoded
	#[error("Serialization error: {0}")]
	SerializationError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl QueueError {
	pub fn connection_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConnectionError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn publish_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::PublishError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn consume_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConsumeError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn serialization_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::SerializationError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for QueueError {
	fn trace_id(&self) -> String {
		match self {
			Self::ConnectionError(ctx) => ctx.trace_id.clone(),
			Self::PublishError(ctx) => ctx.trace_id.clone(),
			Self::ConsumeError(ctx) => ctx.trace_id.clone(),
			Self::SerializationError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
