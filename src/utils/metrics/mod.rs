//! Metrics module for the application.
//!
//! - This module contains the global Prometheus registry.
//! - Defines specific metrics for the observation pipeline.

pub mod server;
use lazy_static::lazy_static;
use prometheus::{
	Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use sysinfo::{Disks, System};

lazy_static! {
	// Global Prometheus registry.
	pub static ref REGISTRY: Registry = Registry::new();

	// Gauge for CPU usage percentage.
	pub static ref CPU_USAGE: Gauge = {
	  let gauge = Gauge::new("cpu_usage_percentage", "Current CPU usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for memory usage percentage.
	pub static ref MEMORY_USAGE_PERCENT: Gauge = {
	  let gauge = Gauge::new("memory_usage_percentage", "Memory usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for memory usage in bytes.
	pub static ref MEMORY_USAGE: Gauge = {
		let gauge = Gauge::new("memory_usage_bytes", "Memory usage in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Gauge for total memory in bytes.
	pub static ref TOTAL_MEMORY: Gauge = {
	  let gauge = Gauge::new("total_memory_bytes", "Total memory in bytes").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for available memory in bytes.
	pub static ref AVAILABLE_MEMORY: Gauge = {
		let gauge = Gauge::new("available_memory_bytes", "Available memory in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Gauge for used disk space in bytes.
	pub static ref DISK_USAGE: Gauge = {
	  let gauge = Gauge::new("disk_usage_bytes", "Used disk space in bytes").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for disk usage percentage.
	pub static ref DISK_USAGE_PERCENT: Gauge = {
	  let gauge = Gauge::new("disk_usage_percentage", "Disk usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Number of chains with a running poller
	pub static ref CHAINS_OBSERVED: Gauge = {
		let gauge = Gauge::new("chains_observed", "Number of chains with an active poller").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Last fully processed height per chain
	pub static ref LAST_PARSED_HEIGHT: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("last_parsed_height", "Last block height fully dispatched per chain"),
			&["chain"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref BLOCKS_PROCESSED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("blocks_processed_total", "Blocks fetched and dispatched per chain"),
			&["chain"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	pub static ref TRANSACTIONS_DISPATCHED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("transactions_dispatched_total", "Transactions handed to the dispatcher per chain"),
			&["chain"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Aborted cycles, labelled with the stage that failed
	pub static ref CYCLE_FAILURES: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("cycle_failures_total", "Aborted polling cycles per chain and stage"),
			&["chain", "stage"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	pub static ref NOTIFICATIONS_PUBLISHED: IntCounter = {
		let counter = IntCounter::new("notifications_published_total", "Notification events published").unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Consumer outcomes: ack, dropped, requeued
	pub static ref CONSUMER_MESSAGES: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("consumer_messages_total", "Messages handled per queue and outcome"),
			&["queue", "outcome"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};
}

/// Gather all metrics and encode into the provided format.
pub fn gather_metrics() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
	let encoder = TextEncoder::new();
	let metric_families = REGISTRY.gather();
	let mut buffer = Vec::new();
	encoder.encode(&metric_families, &mut buffer)?;
	Ok(buffer)
}

/// Updates the system metrics for CPU and memory usage.
pub fn update_system_metrics() {
	let mut sys = System::new_all();
	sys.refresh_all();

	CPU_USAGE.set(sys.global_cpu_usage() as f64);

	let total_memory = sys.total_memory();
	TOTAL_MEMORY.set(total_memory as f64);
	AVAILABLE_MEMORY.set(sys.available_memory() as f64);

	let memory_usage = sys.used_memory();
	MEMORY_USAGE.set(memory_usage as f64);

	let memory_percentage = if total_memory > 0 {
		(memory_usage as f64 / total_memory as f64) * 100.0
	} else {
		0.0
	};
	MEMORY_USAGE_PERCENT.set(memory_percentage);

	// Sum total and available space across all disks
	let disks = Disks::new_with_refreshed_list();
	let mut total_disk_space: u64 = 0;
	let mut total_disk_available: u64 = 0;
	for disk in disks.list() {
		total_disk_space += disk.total_space();
		total_disk_available += disk.available_space();
	}
	let used_disk_space = total_disk_space.saturating_sub(total_disk_available);
	DISK_USAGE.set(used_disk_space as f64);

	let disk_percentage = if total_disk_space > 0 {
		(used_disk_space as f64 / total_disk_space as f64) * 100.0
	} else {
		0.0
	};
	DISK_USAGE_PERCENT.set(disk_percentage);
}

/// Records the outcome of a polling cycle that failed at `stage`
pub fn record_cycle_failure(chain: u32, stage: &str) {
	CYCLE_FAILURES
		.with_label_values(&[&chain.to_string(), stage])
		.inc();
}

/// Records a successfully completed polling cycle
pub fn record_cycle_success(chain: u32, blocks: u64, transactions: usize, height: u64) {
	let chain = chain.to_string();
	BLOCKS_PROCESSED.with_label_values(&[&chain]).inc_by(blocks);
	TRANSACTIONS_DISPATCHED
		.with_label_values(&[&chain])
		.inc_by(transactions as u64);
	LAST_PARSED_HEIGHT
		.with_label_values(&[&chain])
		.set(height as f64);
}

pub fn record_consumer_outcome(queue: &str, outcome: &str) {
	CONSUMER_MESSAGES.with_label_values(&[queue, outcome]).inc();
}
