//! Utility modules for common functionality.
//!
//! - http: Retrying HTTP client construction
//! - logging: Logging setup and traceable errors
//! - metrics: Prometheus metrics and their HTTP endpoint
//! - retry: Fixed-attempt exponential retry

pub mod http;
pub mod logging;
pub mod metrics;
pub mod retry;

pub use retry::{RetryConfig, WithRetry};
