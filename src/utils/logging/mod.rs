//! ## Sets up logging by reading configuration from environment variables.
//!
//! Environment variables used:
//! - LOG_MODE: "stdout" (default) or "file"
//! - LOG_LEVEL: log level ("trace", "debug", "info", "warn", "error"); default is "info"
//! - LOG_DATA_DIR: directory for log files; default is "logs/"
//!
//! `RUST_LOG` takes precedence over `LOG_LEVEL` when both are present.

pub mod error;

use std::{env, fs::create_dir_all, path::Path};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// File name prefix used by the daily rolling appender.
pub const LOG_FILE_PREFIX: &str = "chain-observer.log";

fn create_log_format(with_ansi: bool) -> fmt::format::Format<fmt::format::Compact> {
	fmt::format()
		.with_level(true)
		.with_target(true)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_ansi(with_ansi)
		.compact()
}

/// Builds the env filter: `RUST_LOG` first, then `LOG_LEVEL`, then `info`.
fn build_env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
		EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
	})
}

/// Sets up logging for the process.
///
/// Writes to stdout unless `LOG_MODE=file`, in which case logs go to a daily rolling
/// file inside `LOG_DATA_DIR`.
pub fn setup_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
	let log_mode = env::var("LOG_MODE").unwrap_or_else(|_| "stdout".to_string());

	if log_mode.eq_ignore_ascii_case("file") {
		let log_dir = env::var("LOG_DATA_DIR").unwrap_or_else(|_| "logs/".to_string());
		let log_dir = Path::new(&log_dir);
		create_dir_all(log_dir)?;

		let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
		tracing_subscriber::registry()
			.with(build_env_filter())
			.with(
				fmt::layer()
					.with_writer(appender)
					.event_format(create_log_format(false))
					.fmt_fields(fmt::format::PrettyFields::new()),
			)
			.try_init()?;

		tracing::info!("Logging to directory {}", log_dir.display());
		return Ok(());
	}

	setup_logging_with_writer(std::io::stdout)
}

/// Setup logging with a custom writer
///
/// Used by tests to capture output.
pub fn setup_logging_with_writer<W>(
	writer: W,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>
where
	W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
	tracing_subscriber::registry()
		.with(build_env_filter())
		.with(
			fmt::layer()
				.with_writer(writer)
				.event_format(create_log_format(true))
				.fmt_fields(fmt::format::PrettyFields::new()),
		)
		.try_init()?;
	Ok(())
}
