//! Dispatch error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum DispatchError {
	/// At least one event of the batch was not accepted by the queue
	#[error("Publish error: {0}")]
	PublishError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl DispatchError {
	pub fn publish_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::PublishError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for DispatchError {
	fn trace_id(&self) -> String {
		match self {
			Self::PublishError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
