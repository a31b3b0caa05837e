//! Chain observer service entry point.
//!
//! Follows every configured chain, matches new transactions against address
//! subscriptions and delivers the resulting events through the queue.
//!
//! # Flow
//! 1. Loads chain and observer configuration (fatal on error)
//! 2. Builds the stores, the chain registry, the queue and the services
//! 3. Starts one poller per block-capable chain, the consumers and the broker supervisor
//! 4. On Ctrl+C or a dead broker, stops pollers, then consumers

use chain_observer::{
	bootstrap::{create_registry, initialize_services, Result},
	models::ObserverConfig,
	repositories::ChainService,
	services::{queue::RedisQueue, storage::FileStore},
	utils::{logging::setup_logging, metrics::server::create_metrics_server},
};

use clap::{Arg, Command};
use dotenvy::dotenv;
use std::{
	env::{set_var, var},
	path::PathBuf,
	sync::Arc,
};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
	let matches = Command::new("chain-observer")
		.version(env!("CARGO_PKG_VERSION"))
		.about(
			"Observes blocks across many chains and dispatches transaction events to \
			 address subscribers.",
		)
		.arg(
			Arg::new("config-dir")
				.long("config-dir")
				.help("Directory holding chains/ and observer.json (default: config/)")
				.value_name("PATH"),
		)
		.arg(
			Arg::new("log-file")
				.long("log-file")
				.help("Write logs to file instead of stdout")
				.action(clap::ArgAction::SetTrue),
		)
		.arg(
			Arg::new("log-level")
				.long("log-level")
				.help("Set log level (trace, debug, info, warn, error)")
				.value_name("LEVEL"),
		)
		.arg(
			Arg::new("log-path")
				.long("log-path")
				.help("Path to store log files (default: logs/)")
				.value_name("PATH"),
		)
		.arg(
			Arg::new("metrics-address")
				.long("metrics-address")
				.help("Address to start the metrics server on (default: 127.0.0.1:8081)")
				.value_name("HOST:PORT"),
		)
		.arg(
			Arg::new("metrics")
				.long("metrics")
				.help("Enable metrics server")
				.action(clap::ArgAction::SetTrue),
		)
		.get_matches();

	dotenv().ok();

	// CLI options only apply when the environment does not set them
	if matches.get_flag("log-file") && var("LOG_MODE").is_err() {
		set_var("LOG_MODE", "file");
	}

	if let Some(level) = matches.get_one::<String>("log-level") {
		if var("LOG_LEVEL").is_err() {
			set_var("LOG_LEVEL", level);
		}
	}

	if let Some(path) = matches.get_one::<String>("log-path") {
		if var("LOG_DATA_DIR").is_err() {
			set_var("LOG_DATA_DIR", path);
		}
	}

	setup_logging().unwrap_or_else(|e| {
		eprintln!("Failed to setup logging: {}", e);
	});

	let config_dir = matches
		.get_one::<String>("config-dir")
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from("config"));

	let observer_path = config_dir.join("observer.json");
	let config = ObserverConfig::load(Some(observer_path.as_path())).map_err(|e| {
		error!("Failed to load observer config: {}", e);
		e
	})?;

	let chains_path = config_dir.join("chains");
	let chains = ChainService::new(Some(chains_path.as_path())).map_err(|e| {
		error!("Failed to load chains: {}", e);
		e
	})?;

	let registry = Arc::new(create_registry(chains.get_all().into_values())?);
	let store = Arc::new(FileStore::new(&config.storage_path));
	let queue = Arc::new(
		RedisQueue::connect(
			&config.redis_url,
			config.queue_group.clone(),
			config.queue_consumer.clone(),
			config.queue_block_ms as usize,
		)
		.await
		.map_err(|e| {
			error!("Failed to connect to the broker: {}", e);
			e
		})?,
	);

	let mut pipeline = initialize_services(&config, registry, store, queue).await?;

	let metrics_enabled =
		matches.get_flag("metrics") || var("METRICS_ENABLED").map(|v| v == "true").unwrap_or(false);
	let metrics_address = matches
		.get_one::<String>("metrics-address")
		.map(|s| s.to_string())
		.unwrap_or_else(|| "127.0.0.1:8081".to_string());

	let metrics_server = if metrics_enabled {
		match create_metrics_server(metrics_address) {
			Ok(server) => Some(server),
			Err(e) => {
				error!("Failed to create metrics server: {}", e);
				None
			}
		}
	} else {
		info!("Metrics server disabled. Use --metrics flag or METRICS_ENABLED=true to enable");
		None
	};
	let metrics_handle = metrics_server.as_ref().map(|server| server.handle());
	if let Some(server) = metrics_server {
		tokio::spawn(async move {
			if let Err(e) = server.await {
				error!("Metrics server error: {}", e);
			}
		});
	}

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let consumer_tasks = pipeline.start(shutdown_rx.clone()).await?;

	let supervisor = pipeline.supervisor.clone();
	let mut supervisor_task = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

	info!("Service started. Press Ctrl+C to shutdown");

	tokio::select! {
		result = tokio::signal::ctrl_c() => {
			if let Err(e) = result {
				error!("Error waiting for Ctrl+C: {}", e);
			}
			info!("Shutdown signal received, stopping services...");
		}
		result = &mut supervisor_task => {
			match result {
				Ok(Err(e)) => error!("Broker connection lost for good: {}", e),
				Ok(Ok(())) => info!("Broker supervisor stopped"),
				Err(e) => error!("Broker supervisor panicked: {}", e),
			}
			info!("Stopping services...");
		}
	}

	let _ = shutdown_tx.send(true);

	pipeline.observer.stop_all().await;
	for result in futures::future::join_all(consumer_tasks).await {
		if let Err(e) = result {
			error!("Consumer task failed during shutdown: {}", e);
		}
	}

	if let Some(handle) = metrics_handle {
		handle.stop(true).await;
	}

	info!("Shutdown complete");
	Ok(())
}
