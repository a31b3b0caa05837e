//! Observer error types.
//!
//! Every variant aborts the current cycle of one chain only; the poller logs it
//! and tries again on the next tick.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum ObserverError {
	/// Fetching from the chain source failed after retries
	#[error("Network error: {0}")]
	NetworkError(ErrorContext),

	/// Reading or writing durable state failed
	#[error("Storage error: {0}")]
	StorageError(ErrorContext),

	/// The tracker refused to move backwards
	#[error("Block tracker error: {0}")]
	BlockTrackerError(ErrorContext),

	/// Batch could not be handed to the dispatcher
	#[error("Processing error: {0}")]
	ProcessingError(ErrorContext),

	/// Poller lifecycle problems (duplicate start, join failure)
	#[error("Scheduler error: {0}")]
	SchedulerError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ObserverError {
	pub fn network_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::NetworkError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn storage_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StorageError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn block_tracker_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::BlockTrackerError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn processing_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ProcessingError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn scheduler_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::SchedulerError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for ObserverError {
	fn trace_id(&self) -> String {
		match self {
			Self::NetworkError(ctx) => ctx.trace_id.clone(),
			Self::StorageError(ctx) => ctx.trace_id.clone(),
			Self::BlockTrackerError(ctx) => ctx.trace_id.clone(),
			Self::ProcessingError(ctx) => ctx.trace_id.clone(),
			Self::SchedulerError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
